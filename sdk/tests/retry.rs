use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use futures_util::future;
use protoweave::retry::{self, RetryPolicy, StreamState};
use protoweave::tonic::{Code, Status};

fn recording_policy() -> (RetryPolicy, Arc<Mutex<Vec<StreamState>>>) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&states);
    let policy = RetryPolicy::default().with_observer(move |state| recorded.lock().unwrap().push(state));
    (policy, states)
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_transient_failures() {
    let (policy, states) = recording_policy();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let started = tokio::time::Instant::now();
    let stream = retry::retrying(
        move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                stream::once(future::ready(Err(Status::unavailable("down")))).boxed()
            } else {
                stream::iter(vec![Ok(1u32), Ok(2)]).boxed()
            }
        },
        policy,
    );
    let items: Vec<u32> = stream.map(|item| item.unwrap()).collect().await;

    assert_eq!(items, vec![1, 2]);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(
        *states.lock().unwrap(),
        vec![
            StreamState::Retrying,
            StreamState::Connecting,
            StreamState::Retrying,
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Completed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn resumes_after_failure_mid_stream() {
    let (policy, states) = recording_policy();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let stream = retry::retrying(
        move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                stream::iter(vec![Ok("a"), Err(Status::internal("reset"))]).boxed()
            } else {
                stream::iter(vec![Ok("b")]).boxed()
            }
        },
        policy,
    );
    let items: Vec<&str> = stream.map(|item| item.unwrap()).collect().await;

    assert_eq!(items, vec!["a", "b"]);
    assert_eq!(
        *states.lock().unwrap(),
        vec![
            StreamState::Streaming,
            StreamState::Retrying,
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Completed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn non_transient_failure_is_delivered() {
    let (policy, states) = recording_policy();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let stream = retry::retrying(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            stream::once(future::ready(Err::<u32, _>(Status::not_found("gone")))).boxed()
        },
        policy,
    );
    let items: Vec<Result<u32, Status>> = stream.collect().await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().code(), Code::NotFound);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(*states.lock().unwrap(), vec![StreamState::Failed]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_cancels_reconnects() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let stream = retry::retrying(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            stream::once(future::ready(Err::<u32, _>(Status::unavailable("down")))).boxed()
        },
        RetryPolicy::default(),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    drop(stream);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay, Duration::from_secs(3));
    for code in [
        Code::Unknown,
        Code::DeadlineExceeded,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
    ] {
        assert!(policy.is_transient(code), "{code:?}");
    }
    assert!(!policy.is_transient(Code::NotFound));
    assert!(!policy.is_transient(Code::PermissionDenied));
}
