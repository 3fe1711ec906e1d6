use async_trait::async_trait;
use open_player::{
    audio::{
        ChannelKind, Completion, Connector, Player, PlayerConfig, PlayerError, PlayerEvent,
        PlayerState, Transport, TransportError, VoiceLocation,
    },
    request::{Metadata, Request, RequestError},
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::broadcast, time::timeout};

const WAIT: Duration = Duration::from_secs(2);

/// Estado compartido entre el test y el transporte en memoria.
struct Shared {
    location: Mutex<Option<VoiceLocation>>,
    joins: AtomicUsize,
    connected: AtomicBool,
    played: Mutex<Vec<String>>,
    in_flight: Mutex<Option<Completion>>,
    overlapped: AtomicBool,
    pauses: AtomicUsize,
    /// `join` answers that the platform already has a voice connection
    already_joined: AtomicBool,
    /// Number of upcoming `play` calls that are rejected
    rejected_plays: AtomicUsize,
    broken_teardown: AtomicBool,
}

impl Shared {
    fn in_channel(kind: ChannelKind) -> Arc<Self> {
        Arc::new(Self {
            location: Mutex::new(Some(VoiceLocation {
                guild_id: GuildId::new(1),
                channel_id: ChannelId::new(10),
                kind,
            })),
            joins: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
            played: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
            overlapped: AtomicBool::new(false),
            pauses: AtomicUsize::new(0),
            already_joined: AtomicBool::new(false),
            rejected_plays: AtomicUsize::new(0),
            broken_teardown: AtomicBool::new(false),
        })
    }

    /// Natural end of the source currently playing.
    fn finish(&self) {
        let completion = self.in_flight.lock().take();
        completion.expect("something should be playing").finish(None);
    }

    fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    async fn wait_played(&self, count: usize) {
        timeout(WAIT, async {
            while self.played.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("playback should have started");
    }
}

struct FakeConnector {
    shared: Arc<Shared>,
}

#[async_trait]
impl Connector for FakeConnector {
    type Invoker = ();
    type Transport = FakeTransport;

    async fn locate(&self, _invoker: &()) -> Option<VoiceLocation> {
        *self.shared.location.lock()
    }

    async fn join(&self, _location: &VoiceLocation) -> Result<FakeTransport, TransportError> {
        self.shared.joins.fetch_add(1, Ordering::SeqCst);
        if self.shared.already_joined.load(Ordering::SeqCst) {
            return Err(TransportError::AlreadyConnected);
        }
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(FakeTransport {
            shared: self.shared.clone(),
        })
    }
}

struct FakeTransport {
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for FakeTransport {
    type Source = String;

    async fn play(&self, source: String, completion: Completion) -> Result<(), TransportError> {
        let rejected = self
            .shared
            .rejected_plays
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(TransportError::Unavailable("driver not ready".to_string()));
        }

        let mut in_flight = self.shared.in_flight.lock();
        if in_flight.is_some() {
            self.shared.overlapped.store(true, Ordering::SeqCst);
        }
        *in_flight = Some(completion);
        self.shared.played.lock().push(source);
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        self.shared.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let completion = self.shared.in_flight.lock().take();
        if let Some(completion) = completion {
            completion.finish(None);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self, _force: bool) -> Result<(), TransportError> {
        self.shared.connected.store(false, Ordering::SeqCst);
        // A torn-down call drops its callbacks without firing them
        drop(self.shared.in_flight.lock().take());
        if self.shared.broken_teardown.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("gateway closed".to_string()));
        }
        Ok(())
    }
}

struct FakeRequest {
    metadata: Metadata,
    fail: bool,
    processed: AtomicUsize,
}

impl FakeRequest {
    fn ok(id: u64, title: &str) -> Arc<Self> {
        Arc::new(Self {
            metadata: Metadata::new(id).with_title(title),
            fail: false,
            processed: AtomicUsize::new(0),
        })
    }

    fn failing(id: u64, title: &str) -> Arc<Self> {
        Arc::new(Self {
            metadata: Metadata::new(id).with_title(title),
            fail: true,
            processed: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Request for FakeRequest {
    type Source = String;

    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    async fn process(&self) -> Result<String, RequestError> {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(RequestError::Source("decoder refused the input".to_string()))
        } else {
            Ok(self.metadata.display_title().to_string())
        }
    }
}

fn spawn_player(
    shared: &Arc<Shared>,
    config: PlayerConfig,
) -> Arc<Player<FakeConnector>> {
    let player = Arc::new(Player::new(
        FakeConnector {
            shared: shared.clone(),
        },
        config,
    ));
    tokio::spawn(player.clone().run());
    player
}

async fn next_event(events: &mut broadcast::Receiver<PlayerEvent>) -> PlayerEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("player event in time")
        .expect("event channel open")
}

async fn started_title(events: &mut broadcast::Receiver<PlayerEvent>) -> String {
    match next_event(events).await {
        PlayerEvent::Started(metadata) => metadata.display_title().to_string(),
        other => panic!("expected Started, got {:?}", other),
    }
}

async fn finished_title(events: &mut broadcast::Receiver<PlayerEvent>) -> String {
    match next_event(events).await {
        PlayerEvent::Finished(metadata) => metadata.display_title().to_string(),
        other => panic!("expected Finished, got {:?}", other),
    }
}

async fn reach(player: &Player<FakeConnector>, state: PlayerState) {
    let mut states = player.subscribe();
    timeout(WAIT, states.wait_for(|current| *current == state))
        .await
        .expect("state reached in time")
        .expect("state channel open");
}

#[tokio::test]
async fn test_requests_play_in_fifo_order() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    let requests = [FakeRequest::ok(1, "a"), FakeRequest::ok(2, "b"), FakeRequest::ok(3, "c")];
    for request in &requests {
        player.queue(request.clone());
    }
    player.connect(&()).await.expect("connect");

    for title in ["a", "b", "c"] {
        assert_eq!(started_title(&mut events).await, title);
        shared.finish();
        assert_eq!(finished_title(&mut events).await, title);
    }

    assert_eq!(shared.played(), vec!["a", "b", "c"]);
    assert!(!shared.overlapped.load(Ordering::SeqCst));
    for request in &requests {
        assert_eq!(request.processed.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_current_and_pending_reflect_the_queue() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    assert_eq!(player.current(), None);

    player.queue(FakeRequest::ok(1, "a"));
    player.queue(FakeRequest::ok(2, "b"));
    player.queue(FakeRequest::ok(3, "c"));
    player.connect(&()).await.expect("connect");
    started_title(&mut events).await;

    assert_eq!(player.current().map(|m| m.id), Some(1));
    let pending: Vec<u64> = player.pending(5).iter().map(|m| m.id).collect();
    assert_eq!(pending, vec![2, 3]);
    assert_eq!(player.state(), PlayerState::Playing);
}

#[tokio::test]
async fn test_controls_without_connection_are_noops() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());

    player.skip().await.expect("skip is a no-op");
    player.pause().await.expect("pause is a no-op");
    player.resume().await.expect("resume is a no-op");

    assert_eq!(player.state(), PlayerState::Disconnected);
    assert_eq!(shared.pauses.load(Ordering::SeqCst), 0);
    assert_eq!(shared.joins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skip_ends_current_and_moves_on() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.queue(FakeRequest::ok(1, "a"));
    player.queue(FakeRequest::ok(2, "b"));
    player.connect(&()).await.expect("connect");

    assert_eq!(started_title(&mut events).await, "a");
    player.skip().await.expect("skip");
    assert_eq!(finished_title(&mut events).await, "a");
    assert_eq!(started_title(&mut events).await, "b");
}

#[tokio::test]
async fn test_stop_clears_pending_and_ends_current() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.queue(FakeRequest::ok(1, "a"));
    player.queue(FakeRequest::ok(2, "b"));
    player.queue(FakeRequest::ok(3, "c"));
    player.connect(&()).await.expect("connect");
    assert_eq!(started_title(&mut events).await, "a");

    player.stop().await.expect("stop");
    assert!(player.pending(10).is_empty());
    assert_eq!(finished_title(&mut events).await, "a");

    reach(&player, PlayerState::AwaitingRequest).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(shared.played(), vec!["a"]);
}

#[tokio::test]
async fn test_idle_timeout_disconnects_until_next_connect() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(
        &shared,
        PlayerConfig {
            idle_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        },
    );
    let mut events = player.events();

    player.connect(&()).await.expect("connect");

    assert_eq!(next_event(&mut events).await, PlayerEvent::Disconnected);
    assert_eq!(player.state(), PlayerState::Disconnected);
    assert!(!player.is_attached());
    assert!(!shared.connected.load(Ordering::SeqCst));

    player.queue(FakeRequest::ok(1, "late"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(shared.played().is_empty());
    assert_eq!(player.pending(5).len(), 1);

    player.connect(&()).await.expect("reconnect");
    assert_eq!(started_title(&mut events).await, "late");
    assert_eq!(shared.joins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failing_request_does_not_stop_the_loop() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.queue(FakeRequest::failing(1, "broken"));
    player.queue(FakeRequest::ok(2, "good"));
    player.connect(&()).await.expect("connect");

    match next_event(&mut events).await {
        PlayerEvent::Failed { metadata, reason } => {
            assert_eq!(metadata.id, 1);
            assert!(reason.contains("decoder refused the input"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    assert_eq!(started_title(&mut events).await, "good");
    shared.finish();
    assert_eq!(finished_title(&mut events).await, "good");
    assert_eq!(shared.played(), vec!["good"]);
}

#[tokio::test]
async fn test_connect_twice_keeps_one_transport() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());

    player.connect(&()).await.expect("first connect");
    player.connect(&()).await.expect("second connect");

    assert_eq!(shared.joins.load(Ordering::SeqCst), 1);
    assert!(player.is_attached());
}

#[tokio::test]
async fn test_rejected_submission_does_not_stop_the_loop() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    shared.rejected_plays.store(1, Ordering::SeqCst);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.queue(FakeRequest::ok(1, "rejected"));
    player.queue(FakeRequest::ok(2, "next"));
    player.connect(&()).await.expect("connect");

    match next_event(&mut events).await {
        PlayerEvent::Failed { metadata, reason } => {
            assert_eq!(metadata.id, 1);
            assert!(reason.contains("driver not ready"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    assert_eq!(started_title(&mut events).await, "next");
    shared.finish();
    assert_eq!(finished_title(&mut events).await, "next");
    assert_eq!(shared.played(), vec!["next"]);
    assert!(player.is_attached());
}

#[tokio::test]
async fn test_platform_already_connected_is_swallowed_without_playing() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    shared.already_joined.store(true, Ordering::SeqCst);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.queue(FakeRequest::ok(1, "waiting"));
    player
        .connect(&())
        .await
        .expect("already connected is not an error");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!player.is_attached());
    assert_eq!(player.state(), PlayerState::Disconnected);
    assert_eq!(player.pending(5).len(), 1);
    assert!(shared.played().is_empty());

    shared.already_joined.store(false, Ordering::SeqCst);
    player.connect(&()).await.expect("connect");
    assert_eq!(started_title(&mut events).await, "waiting");
    assert_eq!(shared.joins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_connect_rejects_missing_or_stage_channels() {
    let shared = Shared::in_channel(ChannelKind::Stage);
    let player = spawn_player(&shared, PlayerConfig::default());

    match player.connect(&()).await {
        Err(PlayerError::InvalidChannel(Some(channel))) => assert_eq!(channel, ChannelId::new(10)),
        other => panic!("expected InvalidChannel, got {:?}", other),
    }

    *shared.location.lock() = None;
    assert!(matches!(
        player.connect(&()).await,
        Err(PlayerError::InvalidChannel(None))
    ));

    assert_eq!(shared.joins.load(Ordering::SeqCst), 0);
    assert!(!player.is_attached());
}

#[tokio::test]
async fn test_disconnect() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    assert!(matches!(
        player.disconnect(false).await,
        Err(PlayerError::NotConnected)
    ));

    player.connect(&()).await.expect("connect");
    player.disconnect(false).await.expect("disconnect");

    assert_eq!(next_event(&mut events).await, PlayerEvent::Disconnected);
    assert!(!player.is_attached());
    reach(&player, PlayerState::Disconnected).await;
}

#[tokio::test]
async fn test_failed_teardown_still_clears_local_state() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.connect(&()).await.expect("connect");
    reach(&player, PlayerState::AwaitingRequest).await;
    shared.broken_teardown.store(true, Ordering::SeqCst);

    assert!(matches!(
        player.disconnect(false).await,
        Err(PlayerError::Transport(TransportError::Unavailable(_)))
    ));
    assert!(!player.is_attached());
    assert_eq!(next_event(&mut events).await, PlayerEvent::Disconnected);
    reach(&player, PlayerState::Disconnected).await;
}

#[tokio::test]
async fn test_disconnect_while_waiting_keeps_queue_intact() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.connect(&()).await.expect("connect");
    reach(&player, PlayerState::AwaitingRequest).await;
    player.disconnect(false).await.expect("disconnect");
    assert_eq!(next_event(&mut events).await, PlayerEvent::Disconnected);

    player.queue(FakeRequest::ok(1, "queued"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(shared.played().is_empty());

    player.connect(&()).await.expect("reconnect");
    assert_eq!(started_title(&mut events).await, "queued");
}

#[tokio::test]
async fn test_lost_transport_is_cleaned_up_after_playback() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = spawn_player(&shared, PlayerConfig::default());
    let mut events = player.events();

    player.queue(FakeRequest::ok(1, "a"));
    player.connect(&()).await.expect("connect");
    assert_eq!(started_title(&mut events).await, "a");

    shared.connected.store(false, Ordering::SeqCst);
    shared.finish();

    assert_eq!(finished_title(&mut events).await, "a");
    assert_eq!(next_event(&mut events).await, PlayerEvent::Disconnected);
    assert!(!player.is_attached());
}

#[tokio::test]
async fn test_connection_tone_plays_before_first_request() {
    let shared = Shared::in_channel(ChannelKind::Voice);
    let player = Arc::new(
        Player::new(
            FakeConnector {
                shared: shared.clone(),
            },
            PlayerConfig::default(),
        )
        .with_tone(FakeRequest::ok(0, "tone")),
    );
    tokio::spawn(player.clone().run());
    let mut events = player.events();

    player.queue(FakeRequest::ok(1, "a"));
    player.connect(&()).await.expect("connect");

    shared.wait_played(1).await;
    assert_eq!(shared.played(), vec!["tone"]);
    shared.finish();

    assert_eq!(started_title(&mut events).await, "a");
    assert_eq!(shared.played(), vec!["tone", "a"]);
}
