//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Invariant tests: the laws the channel runtime guarantees.

use std::cell::RefCell;
use std::rc::Rc;

use framechan::substrate::memory::MemoryContext;
use framechan::{
    Call, Channel, ChannelConfig, Frame, HandlerError, Params, Transaction,
};
use serde_json::{Value, json};

const A_ORIGIN: &str = "https://app.example";
const B_ORIGIN: &str = "https://widget.example";

type Built = (MemoryContext, MemoryContext, Rc<Channel>, Rc<Channel>);

/// Builds a ready pair, staggered so exactly one probe survives.
fn ready_pair_configured(
    configure_a: impl FnOnce(ChannelConfig) -> ChannelConfig,
    configure_b: impl FnOnce(ChannelConfig) -> ChannelConfig,
) -> Built {
    let (a_ctx, b_ctx) = MemoryContext::pair(A_ORIGIN, B_ORIGIN);

    let a = Channel::build(configure_a(ChannelConfig::new(a_ctx.peer(), B_ORIGIN))).unwrap();
    a_ctx.attach(&a);
    MemoryContext::settle(&a_ctx, &b_ctx);

    let b = Channel::build(configure_b(ChannelConfig::new(b_ctx.peer(), A_ORIGIN))).unwrap();
    b_ctx.attach(&b);
    MemoryContext::settle(&a_ctx, &b_ctx);

    assert!(a.is_ready());
    assert!(b.is_ready());
    (a_ctx, b_ctx, a, b)
}

fn ready_pair() -> Built {
    ready_pair_configured(|config| config, |config| config)
}

/// Records the transaction id of every posted request frame.
fn request_id_tap(into: &Rc<RefCell<Vec<u64>>>) -> impl Fn(&str, &Frame) {
    let into = Rc::clone(into);
    move |_identity, frame| {
        if let Frame::Request { id, .. } = frame {
            into.borrow_mut().push(*id);
        }
    }
}

#[test]
fn id_spaces_are_disjoint_by_parity() {
    let a_ids = Rc::new(RefCell::new(Vec::new()));
    let b_ids = Rc::new(RefCell::new(Vec::new()));
    let a_tap = request_id_tap(&a_ids);
    let b_tap = request_id_tap(&b_ids);
    let (a_ctx, b_ctx, a, b) = ready_pair_configured(
        move |config| config.with_post_observer(a_tap),
        move |config| config.with_post_observer(b_tap),
    );

    for _ in 0..25 {
        a.call(Call::new("anything").on_success(|_| {})).unwrap();
        b.call(Call::new("anything").on_success(|_| {})).unwrap();
    }
    MemoryContext::settle(&a_ctx, &b_ctx);

    let a_ids = a_ids.borrow();
    let b_ids = b_ids.borrow();
    assert_eq!(a_ids.len(), 25);
    assert_eq!(b_ids.len(), 25);

    // The ping receiver keeps the odd half of the id space, the pong
    // receiver the even half; the sequences can never collide.
    assert!(a_ids.iter().all(|id| id % 2 == 1), "a ids odd: {a_ids:?}");
    assert!(b_ids.iter().all(|id| id % 2 == 0), "b ids even: {b_ids:?}");
    assert!(a_ids.windows(2).all(|w| w[1] == w[0] + 2));
    assert!(b_ids.windows(2).all(|w| w[1] == w[0] + 2));
}

#[test]
fn table_size_tracks_open_calls_in_both_directions() {
    let (a_ctx, b_ctx, a, b) = ready_pair();

    b.bind("echo", |_trans, params| Ok(params.into_value()))
        .unwrap();
    let parked: Rc<RefCell<Vec<Rc<Transaction>>>> = Rc::new(RefCell::new(Vec::new()));
    let parked_in = Rc::clone(&parked);
    b.bind("hang", move |trans, _params| {
        let trans = trans.expect("requests carry a transaction");
        trans.delay_return(true);
        parked_in.borrow_mut().push(trans);
        Ok(Value::Null)
    })
    .unwrap();

    for _ in 0..3 {
        a.call(Call::new("echo").on_success(|_| {})).unwrap();
    }
    for _ in 0..2 {
        a.call(Call::new("hang").on_success(|_| {})).unwrap();
    }
    MemoryContext::settle(&a_ctx, &b_ctx);

    // Echoes finalized; the hangs stay open on both sides.
    assert_eq!(a.open_transactions(), 2);
    assert_eq!(b.open_transactions(), 2);

    for trans in parked.borrow_mut().drain(..) {
        trans.complete(Value::Null).unwrap();
    }
    MemoryContext::settle(&a_ctx, &b_ctx);
    assert_eq!(a.open_transactions(), 0);
    assert_eq!(b.open_transactions(), 0);

    // Destroy empties the table outright.
    a.call(Call::new("hang").on_success(|_| {})).unwrap();
    assert_eq!(a.open_transactions(), 1);
    a.destroy();
    assert_eq!(a.open_transactions(), 0);
}

#[test]
fn callbacks_route_to_exactly_the_invoked_callable() {
    let (a_ctx, b_ctx, a, b) = ready_pair();

    let observed_paths = Rc::new(RefCell::new(Vec::new()));
    let observed_in = Rc::clone(&observed_paths);
    b.bind("job", move |trans, params| {
        let trans = trans.expect("requests carry a transaction");
        *observed_in.borrow_mut() = params.callback_paths();
        trans.invoke("hooks/done", json!("finished")).unwrap();
        Ok(Value::Null)
    })
    .unwrap();

    let fired = Rc::new(RefCell::new(Vec::new()));
    let done_tap = Rc::clone(&fired);
    let fail_tap = Rc::clone(&fired);
    let params = Params::map([(
        "hooks",
        Params::map([
            (
                "done",
                Params::callback(move |value| done_tap.borrow_mut().push(("done", value))),
            ),
            (
                "failed",
                Params::callback(move |value| fail_tap.borrow_mut().push(("failed", value))),
            ),
        ]),
    )]);
    assert_eq!(params.callback_paths(), vec!["hooks/done", "hooks/failed"]);

    a.call(Call::new("job").params(params).on_success(|_| {}))
        .unwrap();
    MemoryContext::settle(&a_ctx, &b_ctx);

    // The handler observed callables at exactly the declared paths …
    assert_eq!(
        observed_paths.borrow().as_slice(),
        &["hooks/done".to_string(), "hooks/failed".to_string()]
    );
    // … and invoking one delivered to that callable alone.
    assert_eq!(fired.borrow().as_slice(), &[("done", json!("finished"))]);
}

#[test]
fn undeclared_callback_is_rejected_at_the_callee() {
    let (a_ctx, b_ctx, a, b) = ready_pair();

    b.bind("job", |trans, _params| {
        let trans = trans.expect("requests carry a transaction");
        let rejected = trans.invoke("undeclared", json!(1));
        assert!(rejected.is_err());
        Ok(Value::Null)
    })
    .unwrap();

    let done = Rc::new(RefCell::new(false));
    let done_tap = Rc::clone(&done);
    a.call(
        Call::new("job").on_success(move |_| *done_tap.borrow_mut() = true),
    )
    .unwrap();
    MemoryContext::settle(&a_ctx, &b_ctx);
    assert!(*done.borrow());
}

#[test]
fn distinct_scopes_never_cross_deliver() {
    let (a_ctx, b_ctx) = MemoryContext::pair(A_ORIGIN, B_ORIGIN);

    let build = |ctx: &MemoryContext, expected: &str, scope: &str| {
        let channel = Channel::build(
            ChannelConfig::new(ctx.peer(), expected).with_scope(scope),
        )
        .unwrap();
        ctx.attach(&channel);
        channel
    };

    let a1 = build(&a_ctx, B_ORIGIN, "alpha");
    let a2 = build(&a_ctx, B_ORIGIN, "beta");
    MemoryContext::settle(&a_ctx, &b_ctx);
    let b1 = build(&b_ctx, A_ORIGIN, "alpha");
    let b2 = build(&b_ctx, A_ORIGIN, "beta");
    MemoryContext::settle(&a_ctx, &b_ctx);
    for channel in [&a1, &a2, &b1, &b2] {
        assert!(channel.is_ready());
    }

    // Same method name on both scoped channels.
    b1.bind("m", |_trans, _params| Ok(json!("alpha"))).unwrap();
    b2.bind("m", |_trans, _params| Ok(json!("beta"))).unwrap();

    let results = Rc::new(RefCell::new(Vec::new()));
    for (channel, scope) in [(&a1, "alpha"), (&a2, "beta")] {
        let tap = Rc::clone(&results);
        let scope = scope.to_string();
        channel
            .call(Call::new("m").on_success(move |result| tap.borrow_mut().push((scope, result))))
            .unwrap();
    }
    MemoryContext::settle(&a_ctx, &b_ctx);

    assert_eq!(
        results.borrow().as_slice(),
        &[
            ("alpha".to_string(), json!("alpha")),
            ("beta".to_string(), json!("beta")),
        ]
    );
}

#[test]
fn pre_ready_sends_flush_fifo() {
    let (a_ctx, b_ctx) = MemoryContext::pair(A_ORIGIN, B_ORIGIN);

    let a = Channel::build(ChannelConfig::new(a_ctx.peer(), B_ORIGIN)).unwrap();
    a_ctx.attach(&a);
    MemoryContext::settle(&a_ctx, &b_ctx);

    // Buffered before the peer even exists.
    a.call(Call::new("first").on_success(|_| {})).unwrap();
    a.notify("second", json!(2)).unwrap();
    a.call(Call::new("third").on_success(|_| {})).unwrap();
    assert!(!a.is_ready());

    let order = Rc::new(RefCell::new(Vec::new()));
    let b = Channel::build(ChannelConfig::new(b_ctx.peer(), A_ORIGIN)).unwrap();
    b_ctx.attach(&b);
    for method in ["first", "second", "third"] {
        let tap = Rc::clone(&order);
        b.bind(method, move |_trans, _params| {
            tap.borrow_mut().push(method);
            Ok(Value::Null)
        })
        .unwrap();
    }

    MemoryContext::settle(&a_ctx, &b_ctx);
    assert_eq!(order.borrow().as_slice(), &["first", "second", "third"]);
}

#[test]
fn error_normalization_round_trips_all_four_shapes() {
    let (a_ctx, b_ctx, a, b) = ready_pair();

    b.bind("string", |_t, _p| Err(HandlerError::from("boom")))
        .unwrap();
    b.bind("pair", |_t, _p| {
        Err(HandlerError::coded("invalid_query", "unbalanced quotes"))
    })
    .unwrap();
    b.bind("object", |_t, _p| {
        Err(HandlerError::from(
            json!({ "error": "denied", "message": "nope" }),
        ))
    })
    .unwrap();
    b.bind("opaque", |_t, _p| {
        Err(HandlerError::from(json!({ "unexpected": true })))
    })
    .unwrap();

    let received = Rc::new(RefCell::new(Vec::new()));
    for method in ["string", "pair", "object", "opaque"] {
        let tap = Rc::clone(&received);
        a.call(
            Call::new(method)
                .on_success(|_| panic!("success must not fire"))
                .on_error(move |code, message| tap.borrow_mut().push((code, message))),
        )
        .unwrap();
    }
    MemoryContext::settle(&a_ctx, &b_ctx);

    assert_eq!(
        received.borrow().as_slice(),
        &[
            ("runtime_error".to_string(), "boom".to_string()),
            (
                "invalid_query".to_string(),
                "unbalanced quotes".to_string()
            ),
            ("denied".to_string(), "nope".to_string()),
            (
                "runtime_error".to_string(),
                r#"{"unexpected":true}"#.to_string()
            ),
        ]
    );
}

#[test]
fn notification_failures_emit_no_frames() {
    let b_posts = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&b_posts);
    let (a_ctx, b_ctx, a, b) = ready_pair_configured(
        |config| config,
        move |config| {
            config.with_post_observer(move |_identity, _frame| {
                *counter.borrow_mut() += 1;
            })
        },
    );

    b.bind("event", |_trans, _params| -> Result<Value, HandlerError> {
        Err(HandlerError::from("handler failed"))
    })
    .unwrap();

    let posted_before = *b_posts.borrow();
    a.notify("event", json!({ "seq": 1 })).unwrap();
    MemoryContext::settle(&a_ctx, &b_ctx);

    // The failure is swallowed: nothing went back on the wire.
    assert_eq!(*b_posts.borrow(), posted_before);
    assert_eq!(a.open_transactions(), 0);
    assert_eq!(b.open_transactions(), 0);
}

#[test]
fn observers_see_accepted_traffic_only() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let tap = Rc::clone(&seen);
    let (a_ctx, b_ctx, a, b) = ready_pair_configured(
        |config| config,
        move |config| {
            config.with_recv_observer(move |sender, frame| {
                tap.borrow_mut().push((sender.to_string(), frame.clone()));
            })
        },
    );
    let handshake_frames = seen.borrow().len();

    b.bind("echo", |_trans, params| Ok(params.into_value()))
        .unwrap();
    a.call(Call::new("echo").on_success(|_| {})).unwrap();
    MemoryContext::settle(&a_ctx, &b_ctx);

    let seen = seen.borrow();
    assert_eq!(seen.len(), handshake_frames + 1);
    let (sender, frame) = &seen[handshake_frames];
    assert_eq!(sender, A_ORIGIN);
    assert!(matches!(frame, Frame::Request { .. }));
}
