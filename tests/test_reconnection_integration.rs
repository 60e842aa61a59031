//! Integration tests running the machine against the real tokio-backed
//! timer under a paused clock

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use halcyon::testing::mocks::{MockChannel, ScriptedTransport};
use halcyon::{Config, ConnectionFsm, Error, Event, State};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Poll with real sleeps so the paused clock auto-advances through the
/// backoff timers
async fn wait_for_state(fsm: &ConnectionFsm<MockChannel>, expected: State) {
    for _ in 0..5000 {
        if fsm.state() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "state never reached {} (currently {})",
        expected,
        fsm.state()
    );
}

#[tokio::test(start_paused = true)]
async fn test_loss_recovers_through_backoff_and_disconnect_settles() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new());
    let fsm = ConnectionFsm::new(Config::default(), transport.clone());

    let channel = fsm.connect().await.unwrap();
    assert_eq!(channel.id(), 1);

    // Two retries fail before the third succeeds
    transport.push_connect(Err(Error::ConnectFailed("refused".into())));
    transport.push_connect(Err(Error::ConnectFailed("refused".into())));
    let state = fsm.fire_event_blocking(Event::ChannelInactive).await.unwrap();
    assert_eq!(state, State::ReconnectWait);

    wait_for_state(&fsm, State::Connected).await;
    assert_eq!(transport.connects(), 4);
    let channel = fsm.channel().unwrap();
    assert_eq!(channel.id(), 2);

    fsm.disconnect().await.unwrap();
    assert_eq!(fsm.state(), State::NotConnected);
    assert_eq!(transport.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_waiters_ride_out_the_retry_loop() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new());
    let fsm = ConnectionFsm::new(Config::default(), transport.clone());

    transport.push_connect(Err(Error::ConnectFailed("refused".into())));
    let result = fsm.connect().await;
    assert!(matches!(result, Err(Error::ConnectFailed(_))));
    assert_eq!(fsm.state(), State::ReconnectWait);

    // A patient caller attaches to the pending retry and resolves with it
    let channel = fsm.get_channel(true).await.unwrap();
    assert_eq!(channel.id(), 1);
    assert_eq!(fsm.state(), State::Connected);
    assert_eq!(transport.connects(), 2);
}
