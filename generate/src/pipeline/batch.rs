//! Batch synchronization of concurrent iterator producers.
//!
//! An iterator stage runs one producer per pending input binding. Producers
//! advance at their own pace; the synchronizer regroups their contributions
//! into rounds so that downstream stages see complete sets of bindings.
//!
//! The bookkeeping lives in `RoundBook`, a plain state machine. The
//! `BatchSynchronizer` actor owns one book and is fed over a bounded channel,
//! so there is exactly one writer. Closed rounds leave over a second bounded
//! channel, so a slow consumer holds back the actor and, through it, the
//! producers.
//!
//! # Invariants
//!
//! - The k-th contribution of a producer goes to round k.
//! - Round k closes exactly when every producer has contributed to it or
//!   has terminated. Rounds therefore close in sequence order.
//! - Termination removes a producer from every round it has not reached.
//! - With zero producers, one empty round closes immediately.
//! - After a forced close, contributions are dropped and logged. They never
//!   open a new round.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::binding::Binding;
use crate::error::{GenerateError, SynchronizerError};

/// Identifier of one producer within a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId(pub usize);

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "producer#{}", self.0)
    }
}

/// A closed round, ready to flow downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub sequence: u64,
    pub bindings: Vec<Binding>,
    /// Producers that contributed, in id order.
    pub contributors: Vec<ProducerId>,
    /// Closed by tear-down rather than by completion.
    pub forced: bool,
}

#[derive(Debug, Default)]
struct OpenRound {
    bindings: Vec<Binding>,
    contributors: BTreeSet<ProducerId>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ProducerState {
    /// Number of contributions made so far, which is also the next round.
    next_round: u64,
    terminated: bool,
}

/// The round bookkeeping of one iterator stage instance.
#[derive(Debug)]
pub struct RoundBook {
    producers: Vec<ProducerState>,
    open: BTreeMap<u64, OpenRound>,
    rounds_created: u64,
    rounds_closed: u64,
    forced_rounds: u64,
    dropped_contributions: u64,
    closing: bool,
    started: bool,
}

impl RoundBook {
    #[must_use]
    pub fn new(producers: usize) -> Self {
        Self {
            producers: vec![ProducerState::default(); producers],
            open: BTreeMap::new(),
            rounds_created: 0,
            rounds_closed: 0,
            forced_rounds: 0,
            dropped_contributions: 0,
            closing: false,
            started: false,
        }
    }

    /// Rounds that close before any message. Only non-empty with zero
    /// producers.
    pub fn start(&mut self) -> Vec<Round> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        if !self.producers.is_empty() {
            return Vec::new();
        }
        self.rounds_created = 1;
        self.rounds_closed = 1;
        vec![Round {
            sequence: 0,
            bindings: Vec::new(),
            contributors: Vec::new(),
            forced: false,
        }]
    }

    /// Record one contribution and return the rounds it closed.
    pub fn contribute(
        &mut self,
        producer: ProducerId,
        bindings: Vec<Binding>,
    ) -> Result<Vec<Round>, SynchronizerError> {
        let state = self.state_mut(producer)?;
        if state.terminated {
            return Err(SynchronizerError::ContributionAfterTermination { producer });
        }
        let sequence = state.next_round;
        state.next_round += 1;

        if self.closing || (sequence < self.rounds_created && !self.open.contains_key(&sequence)) {
            self.dropped_contributions += 1;
            warn!(%producer, round = sequence, bindings = bindings.len(), "dropping late contribution");
            return Ok(Vec::new());
        }

        if sequence == self.rounds_created {
            self.rounds_created += 1;
        }
        trace!(%producer, round = sequence, bindings = bindings.len(), "contribution");
        let round = self.open.entry(sequence).or_default();
        round.bindings.extend(bindings);
        round.contributors.insert(producer);
        Ok(self.drain_complete())
    }

    /// Record that a producer will not contribute again.
    pub fn terminate(&mut self, producer: ProducerId) -> Result<Vec<Round>, SynchronizerError> {
        let state = self.state_mut(producer)?;
        if state.terminated {
            return Err(SynchronizerError::TerminatedTwice { producer });
        }
        state.terminated = true;
        trace!(%producer, "producer terminated");
        Ok(self.drain_complete())
    }

    /// Close every open round with what it holds. Later contributions are
    /// dropped.
    pub fn force_close(&mut self) -> Vec<Round> {
        self.closing = true;
        let open = std::mem::take(&mut self.open);
        let mut rounds = Vec::with_capacity(open.len());
        for (sequence, round) in open {
            info!(
                round = sequence,
                bindings = round.bindings.len(),
                contributors = round.contributors.len(),
                "force-closing round"
            );
            self.rounds_closed += 1;
            self.forced_rounds += 1;
            rounds.push(Round {
                sequence,
                bindings: round.bindings,
                contributors: round.contributors.into_iter().collect(),
                forced: true,
            });
        }
        rounds
    }

    /// Every producer terminated and every round was flushed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.producers.iter().all(|p| p.terminated) && self.open.is_empty()
    }

    #[must_use]
    pub fn open_rounds(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn live_producers(&self) -> usize {
        self.producers.iter().filter(|p| !p.terminated).count()
    }

    #[must_use]
    pub fn report(&self) -> SyncReport {
        SyncReport {
            producers: self.producers.len(),
            rounds: self.rounds_closed,
            forced_rounds: self.forced_rounds,
            dropped_contributions: self.dropped_contributions,
        }
    }

    fn state_mut(&mut self, producer: ProducerId) -> Result<&mut ProducerState, SynchronizerError> {
        self.producers
            .get_mut(producer.0)
            .ok_or(SynchronizerError::UnknownProducer { producer })
    }

    fn is_complete(&self, sequence: u64) -> bool {
        self.producers
            .iter()
            .all(|p| p.terminated || p.next_round > sequence)
    }

    /// Completeness is monotone in the sequence number, so only the front
    /// of the open set needs checking.
    fn drain_complete(&mut self) -> Vec<Round> {
        let mut closed = Vec::new();
        while let Some((&sequence, _)) = self.open.first_key_value() {
            if !self.is_complete(sequence) {
                break;
            }
            let Some(round) = self.open.remove(&sequence) else {
                break;
            };
            self.rounds_closed += 1;
            closed.push(Round {
                sequence,
                bindings: round.bindings,
                contributors: round.contributors.into_iter().collect(),
                forced: false,
            });
        }
        closed
    }
}

/// Counters of one synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub producers: usize,
    pub rounds: u64,
    pub forced_rounds: u64,
    pub dropped_contributions: u64,
}

#[derive(Debug)]
enum Message {
    Contribute {
        producer: ProducerId,
        bindings: Vec<Binding>,
    },
    Terminate {
        producer: ProducerId,
    },
}

/// The actor owning a `RoundBook`.
///
/// # Thread Safety
///
/// Only the actor task touches the book. Producers talk to it through
/// cloned `ProducerHandle`s. Rounds come out in closing order on a channel
/// of the same capacity as the contribution channel.
#[derive(Debug)]
pub struct BatchSynchronizer {
    sender: mpsc::Sender<Message>,
    task: JoinHandle<Result<SyncReport, GenerateError>>,
    producers: usize,
}

impl BatchSynchronizer {
    /// Spawn the actor for `producers` producers.
    ///
    /// When `cancel` trips, open rounds are force-closed and the actor keeps
    /// running until every producer has terminated.
    #[must_use]
    pub fn spawn(
        runtime: &Handle,
        producers: usize,
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<Round>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let (round_sender, round_receiver) = mpsc::channel(buffer.max(1));
        let task = runtime.spawn(run_actor(
            RoundBook::new(producers),
            receiver,
            round_sender,
            cancel,
        ));
        (
            Self {
                sender,
                task,
                producers,
            },
            round_receiver,
        )
    }

    /// Handle for one producer.
    #[must_use]
    pub fn producer(&self, id: ProducerId) -> ProducerHandle {
        ProducerHandle {
            id,
            sender: self.sender.clone(),
        }
    }

    #[must_use]
    pub const fn producers(&self) -> usize {
        self.producers
    }

    /// Wait for the actor to finish.
    ///
    /// # Errors
    ///
    /// Returns `GenerateError::Synchronizer` if a producer broke the protocol.
    pub async fn finish(self) -> Result<SyncReport, GenerateError> {
        drop(self.sender);
        self.task.await?
    }
}

/// The sending side of one producer.
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    id: ProducerId,
    sender: mpsc::Sender<Message>,
}

impl ProducerHandle {
    #[must_use]
    pub const fn id(&self) -> ProducerId {
        self.id
    }

    /// Send one contribution. Waits while the channel is full.
    ///
    /// Returns false if the synchronizer is gone.
    pub async fn contribute(&self, bindings: Vec<Binding>) -> bool {
        self.sender
            .send(Message::Contribute {
                producer: self.id,
                bindings,
            })
            .await
            .is_ok()
    }

    /// Signal that this producer is done.
    pub async fn terminate(&self) -> bool {
        self.sender
            .send(Message::Terminate { producer: self.id })
            .await
            .is_ok()
    }
}

/// Hand closed rounds to the consumer, waiting while its channel is full.
async fn flush(rounds: &mpsc::Sender<Round>, closed: Vec<Round>) {
    for round in closed {
        debug!(
            round = round.sequence,
            bindings = round.bindings.len(),
            forced = round.forced,
            "round closed"
        );
        if rounds.send(round).await.is_err() {
            debug!("round consumer gone");
        }
    }
}

async fn run_actor(
    mut book: RoundBook,
    mut receiver: mpsc::Receiver<Message>,
    rounds: mpsc::Sender<Round>,
    cancel: CancellationToken,
) -> Result<SyncReport, GenerateError> {
    flush(&rounds, book.start()).await;
    let mut cancelled = false;
    while !book.is_finished() {
        tokio::select! {
            biased;
            () = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                flush(&rounds, book.force_close()).await;
            }
            message = receiver.recv() => match message {
                Some(Message::Contribute { producer, bindings }) => {
                    flush(&rounds, book.contribute(producer, bindings)?).await;
                }
                Some(Message::Terminate { producer }) => {
                    flush(&rounds, book.terminate(producer)?).await;
                }
                None => {
                    warn!(live = book.live_producers(), "producers vanished without terminating");
                    flush(&rounds, book.force_close()).await;
                    break;
                }
            },
        }
    }
    Ok(book.report())
}
