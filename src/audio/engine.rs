//! Per-guild playback actor.
//!
//! Each guild with an active queue gets one tokio task that owns its
//! [`GuildQueue`], voice session and player. Facade commands and player
//! lifecycle signals arrive through two inboxes and are handled one at a
//! time, so no lock guards the queue itself.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    error::{EngineError, StreamError, VoiceError},
    events::{Notifier, QueueEvent},
    queue::{GuildQueue, PlaybackState, QueueSnapshot},
    registry::QueueMap,
    stream::StreamProvider,
    voice::{PlayerEvents, PlayerHandle, PlayerSignal, VoiceConnector, VoiceSession},
};
use crate::{config::EngineConfig, sources::Song};

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Command {
    Enqueue { song: Song, reply: Reply<usize> },
    Skip { reply: Reply<Song> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    Stop { reply: Reply<()> },
    Snapshot { reply: Reply<QueueSnapshot> },
}

impl Command {
    /// Responde a un comando que ya no se puede atender
    fn reject(self, error: EngineError) {
        match self {
            Command::Enqueue { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Command::Skip { reply } => {
                let _ = reply.send(Err(error));
            }
            Command::Pause { reply } | Command::Resume { reply } => {
                let _ = reply.send(Err(error));
            }
            // Detener una cola que ya terminó no es un error
            Command::Stop { reply } => {
                let _ = reply.send(Ok(()));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

/// Collaborators shared by every guild actor.
#[derive(Clone)]
pub struct EngineDeps {
    pub voice: Arc<dyn VoiceConnector>,
    pub streams: Arc<dyn StreamProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub config: EngineConfig,
}

/// Cheap, cloneable address of a guild's actor.
///
/// Every method resolves to [`EngineError::QueueClosed`] once the actor has
/// shut down; callers holding a stale handle should ask the registry again.
#[derive(Debug, Clone)]
pub struct GuildHandle {
    guild_id: GuildId,
    generation: u64,
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    /// Se cancela cuando el actor terminó y ya salió del canal de voz
    released: CancellationToken,
    connected: Arc<AtomicBool>,
}

impl GuildHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| EngineError::QueueClosed)?;
        rx.await.map_err(|_| EngineError::QueueClosed)?
    }

    /// Agrega una canción; devuelve su posición 1-based
    pub async fn enqueue(&self, song: Song) -> Result<usize, EngineError> {
        self.request(|reply| Command::Enqueue { song, reply }).await
    }

    pub async fn skip(&self) -> Result<Song, EngineError> {
        self.request(|reply| Command::Skip { reply }).await
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Resume { reply }).await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.cancel.is_cancelled()
    }

    /// `true` mientras el actor tiene una sesión de voz abierta
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> CancellationToken {
        self.released.clone()
    }

    /// Cancela el trabajo en curso y espera a que el actor libere la voz.
    pub(crate) async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        let sent = self.tx.send(Command::Stop { reply }).is_ok();
        self.cancel.cancel();
        if sent {
            let _ = rx.await;
        }
        self.released.cancelled().await;
    }
}

/// Starts the actor for `guild_id`. The actor joins `channel_id` before
/// serving any command; commands sent meanwhile wait in the inbox.
///
/// When `previous` is given (the `released` token of the actor this one
/// replaces), the join waits until that actor has left the voice channel.
pub(crate) fn spawn(
    guild_id: GuildId,
    channel_id: ChannelId,
    generation: u64,
    previous: Option<CancellationToken>,
    deps: EngineDeps,
    queues: Arc<QueueMap>,
) -> GuildHandle {
    let (tx, commands) = mpsc::unbounded_channel();
    let (signals_tx, signals) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let released = CancellationToken::new();
    let connected = Arc::new(AtomicBool::new(false));

    let actor = GuildActor {
        queue: GuildQueue::new(guild_id, deps.config.max_queue_size),
        channel_id,
        generation,
        deps,
        queues,
        cancel: cancel.clone(),
        previous,
        connected: connected.clone(),
        commands,
        signals_tx,
        signals,
        session: None,
        player: None,
        bound_seq: None,
        next_seq: 0,
        idle_since: None,
    };
    // También se libera si el actor entra en pánico
    let release_guard = released.clone().drop_guard();
    tokio::spawn(async move {
        let _released = release_guard;
        actor.run().await;
    });

    GuildHandle {
        guild_id,
        generation,
        tx,
        cancel,
        released,
        connected,
    }
}

struct GuildActor {
    queue: GuildQueue,
    channel_id: ChannelId,
    generation: u64,
    deps: EngineDeps,
    queues: Arc<QueueMap>,
    cancel: CancellationToken,
    previous: Option<CancellationToken>,
    connected: Arc<AtomicBool>,
    commands: mpsc::UnboundedReceiver<Command>,
    signals_tx: mpsc::UnboundedSender<(u64, PlayerSignal)>,
    signals: mpsc::UnboundedReceiver<(u64, PlayerSignal)>,
    session: Option<Box<dyn VoiceSession>>,
    player: Option<Box<dyn PlayerHandle>>,
    /// Secuencia del track enlazado; señales con otra secuencia son viejas
    bound_seq: Option<u64>,
    next_seq: u64,
    idle_since: Option<Instant>,
}

impl GuildActor {
    fn guild_id(&self) -> GuildId {
        self.queue.guild_id()
    }

    async fn run(mut self) {
        let guild_id = self.guild_id();

        // Songbird tiene una sola llamada por guild: no entrar hasta que la
        // cola anterior haya salido
        if let Some(previous) = self.previous.take() {
            debug!("[{}] Esperando a que la cola anterior salga de la voz", guild_id);
            previous.cancelled().await;
        }

        let joined = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.deps.voice.join(guild_id, self.channel_id) => Some(result),
        };

        match joined {
            Some(Ok(session)) => {
                self.session = Some(session);
                self.connected.store(true, Ordering::SeqCst);
            }
            Some(Err(e)) => {
                error!("❌ [{}] Error al conectar al canal de voz: {}", guild_id, e);
                self.unregister();
                let message = e.to_string();
                self.drain_closed(|| EngineError::VoiceJoin(message.clone()));
                return;
            }
            None => {
                self.unregister();
                self.drain_closed(|| EngineError::QueueClosed);
                return;
            }
        }

        self.go_idle();
        let mut stop_reply = None;

        loop {
            let idle_deadline = self.idle_deadline();

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some((seq, signal)) = self.signals.recv() => {
                    self.on_signal(seq, signal).await;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Stop { reply }) => {
                        stop_reply = Some(reply);
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = sleep_until(idle_deadline.unwrap_or_else(Instant::now)), if idle_deadline.is_some() => {
                    info!("💤 [{}] Sin actividad, desconectando", guild_id);
                    break;
                }
            }
        }

        self.teardown().await;
        self.unregister();
        if let Some(reply) = stop_reply {
            let _ = reply.send(Ok(()));
        }
        self.drain_closed(|| EngineError::QueueClosed);
        debug!("[{}] Actor terminado", guild_id);
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue { song, reply } => self.enqueue(song, reply).await,
            Command::Skip { reply } => {
                let skipped = self.skip();
                let advance = skipped.is_ok();
                let _ = reply.send(skipped);
                if advance {
                    self.play_next().await;
                }
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Ok(self.queue.snapshot()));
            }
            Command::Stop { reply } => {
                // El bucle principal intercepta Stop antes de llegar aquí
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn enqueue(&mut self, song: Song, reply: Reply<usize>) {
        match self.queue.push(song.clone()) {
            Ok(position) => {
                self.idle_since = None;
                self.deps
                    .notifier
                    .notify(self.guild_id(), QueueEvent::AddedToQueue { song, position });
                let _ = reply.send(Ok(position));

                if !self.queue.is_active() {
                    self.play_next().await;
                }
            }
            Err(e) => {
                warn!("⚠️ [{}] {}", self.guild_id(), e);
                let _ = reply.send(Err(e));
            }
        }
    }

    fn skip(&mut self) -> Result<Song, EngineError> {
        if !self.queue.is_active() {
            return Err(EngineError::NothingPlaying);
        }

        self.unbind_player();
        self.queue.set_state(PlaybackState::Idle);
        let skipped = self.queue.pop_head().ok_or(EngineError::NothingPlaying)?;
        info!("⏭️ [{}] Saltada: {}", self.guild_id(), skipped.title());
        Ok(skipped)
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        match self.queue.state() {
            PlaybackState::Idle => Err(EngineError::NothingPlaying),
            PlaybackState::Paused => Err(EngineError::AlreadyPaused),
            PlaybackState::Playing => {
                self.player
                    .as_ref()
                    .ok_or(VoiceError::NotConnected)?
                    .pause()?;
                self.queue.set_state(PlaybackState::Paused);
                info!("⏸️ [{}] Reproducción pausada", self.guild_id());
                Ok(())
            }
        }
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if let Some(player) = &self.player {
            player.resume()?;
        }
        if self.queue.state() == PlaybackState::Paused {
            self.queue.set_state(PlaybackState::Playing);
            info!("▶️ [{}] Reproducción reanudada", self.guild_id());
        }
        Ok(())
    }

    async fn on_signal(&mut self, seq: u64, signal: PlayerSignal) {
        if self.bound_seq != Some(seq) {
            debug!("[{}] Ignorando señal vieja (seq {}): {:?}", self.guild_id(), seq, signal);
            return;
        }

        self.bound_seq = None;
        self.player = None;
        self.queue.set_state(PlaybackState::Idle);
        let finished = self.queue.pop_head();

        match signal {
            PlayerSignal::Finished => {
                if let Some(song) = finished {
                    debug!("[{}] Terminó: {}", self.guild_id(), song.title());
                }
                self.queue.reset_failures();
            }
            PlayerSignal::Errored(message) => {
                let title = finished.as_ref().map_or("?", Song::title);
                warn!("❌ [{}] Error reproduciendo {}: {}", self.guild_id(), title, message);
                if self.trip_failure_guard() {
                    return;
                }
            }
        }

        self.play_next().await;
    }

    /// Starts the head of the queue, dropping songs that fail to open until
    /// one plays or the queue runs out.
    async fn play_next(&mut self) {
        loop {
            let Some(song) = self.queue.head().cloned() else {
                self.go_idle();
                return;
            };

            match self.start(&song).await {
                Ok(()) => {
                    info!("🎵 [{}] Reproduciendo: {}", self.guild_id(), song.title());
                    self.deps
                        .notifier
                        .notify(self.guild_id(), QueueEvent::NowPlaying { song });
                    return;
                }
                Err(EngineError::Stream(StreamError::Cancelled)) => {
                    debug!("[{}] Apertura cancelada: {}", self.guild_id(), song.title());
                    return;
                }
                Err(e) => {
                    warn!("❌ [{}] No se pudo reproducir {}: {}", self.guild_id(), song.title(), e);
                    self.queue.pop_head();
                    self.deps.notifier.notify(
                        self.guild_id(),
                        QueueEvent::Error {
                            message: format!("No se pudo reproducir **{}**: {}", song.title(), e),
                        },
                    );
                    if self.trip_failure_guard() {
                        return;
                    }
                }
            }
        }
    }

    async fn start(&mut self, song: &Song) -> Result<(), EngineError> {
        let timeout = self.deps.config.stream_open_timeout;

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled.into()),
            opened = tokio::time::timeout(timeout, self.deps.streams.open(song.source_url())) => {
                opened.map_err(|_| StreamError::Timeout(timeout))??
            }
        };
        debug!("[{}] Stream abierto ({})", self.guild_id(), stream.hint);

        let session = self.session.as_mut().ok_or(VoiceError::NotConnected)?;
        self.next_seq += 1;
        let seq = self.next_seq;
        let player = session
            .play(stream, PlayerEvents::new(seq, self.signals_tx.clone()))
            .await?;

        self.player = Some(player);
        self.bound_seq = Some(seq);
        self.queue.set_state(PlaybackState::Playing);
        self.queue.reset_failures();
        self.idle_since = None;
        Ok(())
    }

    /// Counts one failure; past the limit the rest of the queue is dropped.
    fn trip_failure_guard(&mut self) -> bool {
        let failures = self.queue.record_failure();
        if failures < self.deps.config.max_consecutive_failures {
            return false;
        }

        let dropped = self.queue.clear();
        self.queue.reset_failures();
        self.go_idle();
        error!(
            "🛑 [{}] {} fallos seguidos, descartando {} canciones",
            self.guild_id(),
            failures,
            dropped
        );
        self.deps.notifier.notify(
            self.guild_id(),
            QueueEvent::Error {
                message: format!(
                    "Demasiados fallos seguidos ({}). Se limpió la cola ({} canciones).",
                    failures, dropped
                ),
            },
        );
        true
    }

    fn unbind_player(&mut self) {
        self.bound_seq = None;
        if let Some(player) = self.player.take() {
            if let Err(e) = player.stop() {
                warn!("⚠️ [{}] {}", self.guild_id(), e);
            }
        }
    }

    fn go_idle(&mut self) {
        self.queue.set_state(PlaybackState::Idle);
        if self.idle_since.is_none() {
            self.idle_since = Some(Instant::now());
        }
    }

    fn idle_deadline(&self) -> Option<Instant> {
        if self.queue.is_active() || !self.queue.is_empty() {
            return None;
        }
        Some(self.idle_since? + self.deps.config.idle_disconnect?)
    }

    async fn teardown(&mut self) {
        self.cancel.cancel();
        let cleared = self.queue.clear();
        self.unbind_player();
        self.queue.set_state(PlaybackState::Idle);

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.leave().await {
                warn!("⚠️ [{}] {}", self.guild_id(), e);
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("⏹️ [{}] Cola detenida ({} canciones descartadas)", self.guild_id(), cleared);
    }

    /// Se quita del registro solo si la entrada sigue siendo la suya
    fn unregister(&self) {
        let generation = self.generation;
        self.queues
            .remove_if(&self.guild_id(), |_, handle| handle.generation() == generation);
    }

    fn drain_closed(&mut self, error: impl Fn() -> EngineError) {
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            command.reject(error());
        }
    }
}
