//! Restart behavior of the supervisor.

use std::cell::Cell;
use std::time::{Duration, Instant};

use galendary_server::{Exit, ServerError, Supervisor};

#[test]
fn clean_exit_stops_supervision() {
    let runs = Cell::new(0);
    let exit = Supervisor::new(Duration::ZERO).run(|| {
        runs.set(runs.get() + 1);
        Ok(())
    });
    assert!(matches!(exit, Exit::Clean));
    assert_eq!(runs.get(), 1);
}

#[test]
fn error_then_success_restarts_once() {
    let runs = Cell::new(0);
    let exit = Supervisor::new(Duration::from_millis(1)).run(|| {
        runs.set(runs.get() + 1);
        if runs.get() == 1 {
            Err(ServerError::Config("database unreachable".to_string()))
        } else {
            Ok(())
        }
    });
    assert!(matches!(exit, Exit::Clean));
    assert_eq!(runs.get(), 2);
}

#[test]
fn panic_is_caught_and_restarted() {
    let runs = Cell::new(0);
    let exit = Supervisor::new(Duration::ZERO).run(|| {
        runs.set(runs.get() + 1);
        if runs.get() < 3 {
            panic!("handler blew up");
        }
        Ok(())
    });
    assert!(matches!(exit, Exit::Clean));
    assert_eq!(runs.get(), 3);
}

#[test]
fn restart_budget_is_honored() {
    let runs = Cell::new(0);
    let exit = Supervisor::new(Duration::ZERO).max_restarts(2).run(|| {
        runs.set(runs.get() + 1);
        panic!("always");
    });
    assert_eq!(runs.get(), 3);
    match exit {
        Exit::GaveUp(ServerError::HandlerPanicked(msg)) => assert_eq!(msg, "always"),
        other => panic!("unexpected exit: {other:?}"),
    }
}

#[test]
fn waits_the_restart_delay() {
    let runs = Cell::new(0);
    let started = Instant::now();
    let exit = Supervisor::new(Duration::from_millis(40))
        .max_restarts(1)
        .run(|| {
            runs.set(runs.get() + 1);
            Err(ServerError::Runtime("down".to_string()))
        });
    assert!(matches!(exit, Exit::GaveUp(ServerError::Runtime(_))));
    assert_eq!(runs.get(), 2);
    assert!(started.elapsed() >= Duration::from_millis(40));
}
