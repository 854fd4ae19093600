use std::{collections::HashMap, time::Duration};
use tracing::{error, info, warn};

use tokio::{
    signal,
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use common::actors::{Actor, ActorType, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

const UNRESPONSIVE_AFTER: Duration = Duration::from_secs(3);
const RESTART_DELAY: Duration = Duration::from_secs(5);
const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Stops the heartbeat task together with the actor it reports for.
struct HeartbeatGuard(JoinHandle<()>);

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    pending_restarts: HashMap<ActorType, Instant>,
    unresponsive_after: Duration,
    restart_delay: Duration,
    check_interval: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_timing(UNRESPONSIVE_AFTER, RESTART_DELAY, CHECK_INTERVAL)
    }

    pub fn with_timing(
        unresponsive_after: Duration,
        restart_delay: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            pending_restarts: HashMap::new(),
            unresponsive_after,
            restart_delay,
            check_interval,
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Runs until Ctrl-C or until every actor has shut down gracefully.
    pub async fn start(&mut self) {
        let mut check_interval = time::interval(self.check_interval);
        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => self.handle_control(msg),

                _ = check_interval.tick() => {
                    self.restart_stale_and_due(&supervisor_tx);

                    if self.handles.is_empty() && self.pending_restarts.is_empty() {
                        info!("All actors have stopped.");
                        break;
                    }
                }

                _ = signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down.");
                    break;
                }
            }
        }

        for (actor_type, handle) in self.handles.drain() {
            info!("Stopping {:?}", actor_type);
            handle.abort();
        }
        self.pulses.clear();
        self.pending_restarts.clear();
    }

    fn handle_control(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Heartbeat(actor_type) => {
                if self.handles.contains_key(&actor_type) {
                    self.pulses.insert(actor_type, Instant::now());
                }
            }
            ControlMessage::Shutdown(actor_type) => {
                warn!("{:?} is shutting down gracefully.", actor_type);
                self.forget(actor_type);
            }
            ControlMessage::Error(actor_type, error_msg) => {
                error!(
                    "Actor {:?} reported error: {}. Restarting in {:?}.",
                    actor_type, error_msg, self.restart_delay
                );
                self.forget(actor_type);
                self.pending_restarts
                    .insert(actor_type, Instant::now() + self.restart_delay);
            }
        }
    }

    fn forget(&mut self, actor_type: ActorType) {
        self.pulses.remove(&actor_type);
        if let Some(handle) = self.handles.remove(&actor_type) {
            handle.abort();
        }
    }

    fn restart_stale_and_due(&mut self, supervisor_tx: &mpsc::Sender<ControlMessage>) {
        let now = Instant::now();

        let stale: Vec<ActorType> = self
            .pulses
            .iter()
            .filter(|(_, last)| now.duration_since(**last) > self.unresponsive_after)
            .map(|(actor_type, _)| *actor_type)
            .collect();

        for actor_type in stale {
            warn!("{:?} is unresponsive! Restarting.", actor_type);
            self.forget(actor_type);
            self.spawn_actor(actor_type, supervisor_tx.clone());
        }

        let due: Vec<ActorType> = self
            .pending_restarts
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(actor_type, _)| *actor_type)
            .collect();

        for actor_type in due {
            self.pending_restarts.remove(&actor_type);
            info!("Restarting {:?}", actor_type);
            self.spawn_actor(actor_type, supervisor_tx.clone());
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            error!("No factory registered for {:?}", actor_type);
            return;
        };
        let mut new_actor = factory();

        let new_actor_handle = tokio::spawn(async move {
            let heartbeat = HeartbeatGuard(new_actor.spawn_heartbeat(tx.clone()));

            let outcome = match new_actor.run(tx.clone()).await {
                Ok(()) => ControlMessage::Shutdown(actor_type),
                Err(e) => {
                    error!("Actor {:?} crashed: {:#}", actor_type, e);
                    ControlMessage::Error(actor_type, e.to_string())
                }
            };

            drop(heartbeat);
            let _ = tx.send(outcome).await;
        });

        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    /// Fails on the first run, finishes cleanly on every later one.
    struct FlakyActor {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Actor for FlakyActor {
        fn name(&self) -> ActorType {
            ActorType::Executor
        }

        async fn run(&mut self, _tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("first run fails");
            }
            Ok(())
        }
    }

    /// Hangs without heartbeats on the first run.
    struct SilentActor {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Actor for SilentActor {
        fn name(&self) -> ActorType {
            ActorType::Notifier
        }

        async fn run(&mut self, _tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        fn spawn_heartbeat(&self, _tx: mpsc::Sender<ControlMessage>) -> JoinHandle<()> {
            tokio::spawn(async {})
        }
    }

    fn fast_supervisor() -> Supervisor {
        Supervisor::with_timing(
            Duration::from_millis(200),
            Duration::from_millis(50),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn test_failed_actor_is_restarted_after_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut supervisor = fast_supervisor();

        let counter = runs.clone();
        supervisor.register_actor(
            ActorType::Executor,
            Box::new(move || {
                Box::new(FlakyActor {
                    runs: counter.clone(),
                })
            }),
        );

        time::timeout(Duration::from_secs(5), supervisor.start())
            .await
            .expect("supervisor should stop once the actor finishes");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unresponsive_actor_is_respawned() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut supervisor = fast_supervisor();

        let counter = runs.clone();
        supervisor.register_actor(
            ActorType::Notifier,
            Box::new(move || {
                Box::new(SilentActor {
                    runs: counter.clone(),
                })
            }),
        );

        time::timeout(Duration::from_secs(5), supervisor.start())
            .await
            .expect("supervisor should stop once the actor finishes");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
