use super::*;
use std::cell::RefCell;

fn recording_sleep(delays: &RefCell<Vec<Duration>>) -> impl FnMut(Duration) + '_ {
    move |d| delays.borrow_mut().push(d)
}

#[test]
fn succeeds_first_try_without_sleeping() {
    let delays = RefCell::new(Vec::new());
    let policy = RetryPolicy::default();

    let result = execute_with_retry(&policy, |_| Ok::<_, AttemptError>(42), recording_sleep(&delays));

    assert_eq!(result.expect("should succeed"), 42);
    assert!(delays.borrow().is_empty());
}

#[test]
fn retries_transient_failures_then_succeeds() {
    let delays = RefCell::new(Vec::new());
    let policy = RetryPolicy::default();

    let result = execute_with_retry(
        &policy,
        |attempt| {
            if attempt < 3 {
                Err(AttemptError::Transient(anyhow::anyhow!("timeout")))
            } else {
                Ok("done")
            }
        },
        recording_sleep(&delays),
    );

    assert_eq!(result.expect("should succeed on third attempt"), "done");
    assert_eq!(
        *delays.borrow(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[test]
fn gives_up_after_max_attempts() {
    let delays = RefCell::new(Vec::new());
    let policy = RetryPolicy::default().with_max_attempts(4);
    let mut calls = 0;

    let result: Result<(), _> = execute_with_retry(
        &policy,
        |_| {
            calls += 1;
            Err(AttemptError::Transient(anyhow::anyhow!("still down")))
        },
        recording_sleep(&delays),
    );

    assert!(result.is_err());
    assert_eq!(calls, 4);
    // No sleep after the final failure
    assert_eq!(delays.borrow().len(), 3);
}

#[test]
fn backoff_sequence_is_geometric() {
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(100),
        multiplier: 2,
    };

    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
}

#[test]
fn permanent_errors_do_not_retry() {
    let delays = RefCell::new(Vec::new());
    let policy = RetryPolicy::default();
    let mut calls = 0;

    let result: Result<(), _> = execute_with_retry(
        &policy,
        |_| {
            calls += 1;
            Err(AttemptError::Permanent(anyhow::anyhow!("HTTP 400")))
        },
        recording_sleep(&delays),
    );

    assert!(result.is_err());
    assert_eq!(calls, 1);
    assert!(delays.borrow().is_empty());
}
