//! Eventual value guarantees, exercised through the public API only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ribbon_core::{
    Deferred, Eventual, Resolution, ResolutionError, Settlement, State, ThenMember, Thenable,
};

use crate::common::on_local;

type Ev = Eventual<i32, String>;

/// Calls its success callback with 42 from a later task.
struct LateAnswer;

impl Thenable<i32, String> for LateAnswer {
    fn then_member(&self) -> Result<ThenMember<i32, String>, String> {
        Ok(ThenMember::Callable(Box::new(|resolver| {
            drop(tokio::task::spawn_local(async move { resolver.resolve(42) }));
            Ok(())
        })))
    }
}

#[tokio::test]
async fn settles_only_once() {
    on_local(async {
        let deferred = Deferred::<i32, String>::new();
        deferred.resolve(1);
        deferred.resolve(2);
        deferred.reject("late".to_string());

        assert_eq!(deferred.eventual().await, Ok(1));
        assert_eq!(
            deferred.eventual().settlement(),
            Some(Settlement::Fulfilled(1))
        );
    })
    .await;
}

#[tokio::test]
async fn first_rejection_sticks() {
    on_local(async {
        let eventual = Ev::new(|resolver| {
            resolver.reject("first".to_string());
            resolver.resolve(7);
        });
        assert_eq!(eventual.state(), State::Rejected);
        assert_eq!(eventual.await, Err("first".to_string()));
    })
    .await;
}

#[tokio::test]
async fn resolving_with_itself_rejects() {
    on_local(async {
        let deferred = Deferred::<i32, String>::new();
        deferred.resolve(deferred.eventual());

        assert_eq!(
            deferred.eventual().await,
            Err(ResolutionError::SelfResolution.to_string())
        );
    })
    .await;
}

#[tokio::test]
async fn foreign_thenable_is_assimilated() {
    on_local(async {
        let deferred = Deferred::<i32, String>::new();
        deferred.resolve(Resolution::thenable(LateAnswer));
        assert_eq!(deferred.eventual().await, Ok(42));
    })
    .await;
}

#[tokio::test]
async fn rejection_skips_fulfilment_handlers() {
    on_local(async {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let rejected = Ev::rejected("x".to_string());
        let dependent = rejected.and_then(move |v| {
            flag.set(true);
            Ok(Resolution::Value(v + 1))
        });

        assert_eq!(dependent.await, Err("x".to_string()));
        assert!(!ran.get());
    })
    .await;
}

#[tokio::test]
async fn rejection_reaches_first_rejection_handler_down_the_chain() {
    on_local(async {
        let recovered = Ev::rejected("x".to_string())
            .map(|v| v * 2)
            .and_then(|v| Ok(Resolution::Value(v + 1)))
            .or_else(|cause| Ok(Resolution::Value(i32::try_from(cause.len()).unwrap_or(0))));
        assert_eq!(recovered.await, Ok(1));
    })
    .await;
}

#[tokio::test]
async fn handlers_on_settled_values_run_later() {
    on_local(async {
        let log = Rc::new(RefCell::new(Vec::new()));
        let record = Rc::clone(&log);
        let dependent = Ev::fulfilled(5).map(move |v| {
            record.borrow_mut().push("handler");
            v
        });
        log.borrow_mut().push("after registration");

        assert_eq!(*log.borrow(), vec!["after registration"]);
        assert_eq!(dependent.await, Ok(5));
        assert_eq!(*log.borrow(), vec!["after registration", "handler"]);
    })
    .await;
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    on_local(async {
        let deferred = Deferred::<i32, String>::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let dependents: Vec<_> = (0..3)
            .map(|id| {
                let order = Rc::clone(&order);
                deferred.eventual().map(move |v| {
                    order.borrow_mut().push(id);
                    v
                })
            })
            .collect();

        deferred.resolve(1);
        for dependent in dependents {
            assert_eq!(dependent.await, Ok(1));
        }
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    })
    .await;
}
