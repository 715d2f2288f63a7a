//! Read-aloud.
//!
//! A [`SpeechSink`] turns text into audio and reports progress as
//! [`SpeechEvent`]s on a channel. [`ReadAloud`] sits in front of the sink and
//! enforces the one rule that matters: the current playback is cancelled
//! before a new one starts. Requests are never queued.

use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech command is empty")]
    EmptyCommand,

    #[error("Failed to start speech command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Playback progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeechSignal {
    Started,
    /// Cancelled before the end
    Stopped,
    Finished,
}

/// A signal tagged with the utterance it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechEvent {
    pub utterance: u64,
    pub signal: SpeechSignal,
}

/// Channel sinks report on.
pub fn speech_channel() -> (Sender<SpeechEvent>, Receiver<SpeechEvent>) {
    mpsc::channel()
}

/// Speech synthesis capability.
pub trait SpeechSink: Send + Sync {
    fn speak(&self, utterance: u64, text: &str) -> Result<(), SpeechError>;
    fn cancel(&self);
}

/// What is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SpeechTarget {
    /// The full text of the message at this index
    FullText { message: usize },
    /// One block of the message at this index
    Block { message: usize, block: usize },
}

/// Cancel-then-start controller over a [`SpeechSink`].
pub struct ReadAloud {
    sink: Arc<dyn SpeechSink>,
    events: Receiver<SpeechEvent>,
    next_utterance: u64,
    current: Option<(u64, SpeechTarget)>,
}

impl ReadAloud {
    pub fn new(sink: Arc<dyn SpeechSink>, events: Receiver<SpeechEvent>) -> Self {
        Self {
            sink,
            events,
            next_utterance: 1,
            current: None,
        }
    }

    /// The target currently playing, if any.
    pub fn speaking(&self) -> Option<SpeechTarget> {
        self.current.map(|(_, target)| target)
    }

    /// Start reading `text`, cancelling whatever is playing.
    pub fn start(&mut self, target: SpeechTarget, text: &str) -> Result<u64, SpeechError> {
        self.stop();

        let utterance = self.next_utterance;
        self.next_utterance += 1;

        self.sink.speak(utterance, text)?;
        self.current = Some((utterance, target));
        log::debug!("Reading aloud {:?} as utterance {}", target, utterance);
        Ok(utterance)
    }

    /// Toggle: stop when `target` is already playing, otherwise start it.
    pub fn toggle(&mut self, target: SpeechTarget, text: &str) -> Result<Option<u64>, SpeechError> {
        if self.speaking() == Some(target) {
            self.stop();
            return Ok(None);
        }
        self.start(target, text).map(Some)
    }

    pub fn stop(&mut self) {
        if self.current.take().is_some() {
            self.sink.cancel();
        }
    }

    /// Drain pending signals and return them.
    ///
    /// A terminal signal for the current utterance clears the playing state;
    /// signals from older utterances are returned but change nothing.
    pub fn poll(&mut self) -> Vec<SpeechEvent> {
        let events: Vec<SpeechEvent> = self.events.try_iter().collect();
        for event in &events {
            self.apply(*event);
        }
        events
    }

    fn apply(&mut self, event: SpeechEvent) {
        let is_current = matches!(self.current, Some((id, _)) if id == event.utterance);
        if is_current && event.signal != SpeechSignal::Started {
            self.current = None;
        }
    }
}

/// Sink used when voice output is disabled: accepts everything, plays
/// nothing, reports nothing.
pub struct NullSpeechSink;

impl SpeechSink for NullSpeechSink {
    fn speak(&self, utterance: u64, _text: &str) -> Result<(), SpeechError> {
        log::trace!("Voice output disabled, dropping utterance {}", utterance);
        Ok(())
    }

    fn cancel(&self) {}
}

struct Playback {
    utterance: u64,
    child: Child,
}

/// Sink that runs a system text-to-speech command with the text as its last
/// argument (`say` on macOS, `espeak` elsewhere).
pub struct CommandSpeechSink {
    program: String,
    args: Vec<String>,
    playback: Arc<Mutex<Option<Playback>>>,
    events: Sender<SpeechEvent>,
}

/// Platform default speech command.
pub fn default_speech_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}

impl CommandSpeechSink {
    /// Build from a shell-style command line such as `"espeak -s 150"`.
    pub fn from_command_line(command: &str, events: Sender<SpeechEvent>) -> Result<Self, SpeechError> {
        let mut parts = shlex::split(command)
            .filter(|p| !p.is_empty())
            .ok_or(SpeechError::EmptyCommand)?
            .into_iter();
        let program = parts.next().ok_or(SpeechError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            playback: Arc::new(Mutex::new(None)),
            events,
        })
    }

    fn send(&self, utterance: u64, signal: SpeechSignal) {
        let _ = self.events.send(SpeechEvent { utterance, signal });
    }
}

impl SpeechSink for CommandSpeechSink {
    fn speak(&self, utterance: u64, text: &str) -> Result<(), SpeechError> {
        self.cancel();

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Ok(mut slot) = self.playback.lock() {
            *slot = Some(Playback { utterance, child });
        }
        self.send(utterance, SpeechSignal::Started);

        let playback = Arc::clone(&self.playback);
        let events = self.events.clone();
        thread::spawn(move || loop {
            thread::sleep(WAIT_POLL_INTERVAL);
            let Ok(mut slot) = playback.lock() else {
                return;
            };
            let exited = match slot.as_mut() {
                Some(p) if p.utterance == utterance => {
                    !matches!(p.child.try_wait(), Ok(None))
                }
                // Cancelled or replaced
                _ => return,
            };
            if exited {
                *slot = None;
                let _ = events.send(SpeechEvent {
                    utterance,
                    signal: SpeechSignal::Finished,
                });
                return;
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        let taken = self.playback.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut playback) = taken {
            if let Err(e) = playback.child.kill() {
                log::debug!("Speech process already gone: {}", e);
            }
            let _ = playback.child.wait();
            self.send(playback.utterance, SpeechSignal::Stopped);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sink that records calls and reports synchronously.
    pub(crate) struct RecordingSink {
        pub spoken: Mutex<Vec<(u64, String)>>,
        pub cancels: Mutex<usize>,
        events: Sender<SpeechEvent>,
    }

    impl RecordingSink {
        pub(crate) fn new(events: Sender<SpeechEvent>) -> Self {
            Self {
                spoken: Mutex::new(Vec::new()),
                cancels: Mutex::new(0),
                events,
            }
        }
    }

    impl SpeechSink for RecordingSink {
        fn speak(&self, utterance: u64, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push((utterance, text.to_string()));
            let _ = self.events.send(SpeechEvent {
                utterance,
                signal: SpeechSignal::Started,
            });
            Ok(())
        }

        fn cancel(&self) {
            *self.cancels.lock().unwrap() += 1;
        }
    }

    fn read_aloud() -> (ReadAloud, Arc<RecordingSink>, Sender<SpeechEvent>) {
        let (tx, rx) = speech_channel();
        let sink = Arc::new(RecordingSink::new(tx.clone()));
        (ReadAloud::new(sink.clone(), rx), sink, tx)
    }

    mod read_aloud {
        use super::*;

        #[test]
        fn start_speaks_and_tracks_target() {
            let (mut ra, sink, _) = read_aloud();
            let target = SpeechTarget::FullText { message: 1 };

            let id = ra.start(target, "hello").unwrap();
            assert_eq!(ra.speaking(), Some(target));
            assert_eq!(sink.spoken.lock().unwrap()[0], (id, "hello".to_string()));
        }

        #[test]
        fn starting_again_cancels_current_first() {
            let (mut ra, sink, _) = read_aloud();
            ra.start(SpeechTarget::FullText { message: 1 }, "a").unwrap();
            ra.start(SpeechTarget::Block { message: 1, block: 0 }, "b").unwrap();

            assert_eq!(*sink.cancels.lock().unwrap(), 1);
            assert_eq!(sink.spoken.lock().unwrap().len(), 2);
            assert_eq!(ra.speaking(), Some(SpeechTarget::Block { message: 1, block: 0 }));
        }

        #[test]
        fn stop_without_playback_does_not_cancel() {
            let (mut ra, sink, _) = read_aloud();
            ra.stop();
            assert_eq!(*sink.cancels.lock().unwrap(), 0);
        }

        #[test]
        fn toggle_stops_same_target() {
            let (mut ra, sink, _) = read_aloud();
            let target = SpeechTarget::FullText { message: 3 };

            assert!(ra.toggle(target, "x").unwrap().is_some());
            assert!(ra.toggle(target, "x").unwrap().is_none());
            assert!(ra.speaking().is_none());
            assert_eq!(*sink.cancels.lock().unwrap(), 1);
        }

        #[test]
        fn finished_signal_clears_current() {
            let (mut ra, _, tx) = read_aloud();
            let id = ra.start(SpeechTarget::FullText { message: 0 }, "x").unwrap();

            tx.send(SpeechEvent { utterance: id, signal: SpeechSignal::Finished }).unwrap();
            let events = ra.poll();

            assert_eq!(events.len(), 2); // Started + Finished
            assert!(ra.speaking().is_none());
        }

        #[test]
        fn stale_signal_is_ignored() {
            let (mut ra, _, tx) = read_aloud();
            let first = ra.start(SpeechTarget::FullText { message: 0 }, "x").unwrap();
            ra.start(SpeechTarget::FullText { message: 2 }, "y").unwrap();

            tx.send(SpeechEvent { utterance: first, signal: SpeechSignal::Finished }).unwrap();
            ra.poll();

            assert_eq!(ra.speaking(), Some(SpeechTarget::FullText { message: 2 }));
        }
    }

    mod null_sink {
        use super::*;

        #[test]
        fn accepts_and_reports_nothing() {
            let (_tx, rx) = speech_channel();
            let mut ra = ReadAloud::new(Arc::new(NullSpeechSink), rx);
            ra.start(SpeechTarget::FullText { message: 0 }, "x").unwrap();
            assert!(ra.poll().is_empty());
        }
    }

    mod command_sink {
        use super::*;

        #[test]
        fn empty_command_is_rejected() {
            let (tx, _rx) = speech_channel();
            assert!(matches!(
                CommandSpeechSink::from_command_line("   ", tx),
                Err(SpeechError::EmptyCommand)
            ));
        }

        #[test]
        fn command_line_is_split() {
            let (tx, _rx) = speech_channel();
            let sink = CommandSpeechSink::from_command_line("espeak -s 150", tx).unwrap();
            assert_eq!(sink.program, "espeak");
            assert_eq!(sink.args, vec!["-s", "150"]);
        }

        #[test]
        fn missing_program_fails_to_spawn() {
            let (tx, _rx) = speech_channel();
            let sink =
                CommandSpeechSink::from_command_line("definitely-not-a-tts-binary-xyz", tx).unwrap();
            assert!(matches!(sink.speak(1, "hi"), Err(SpeechError::Spawn(_))));
        }

        #[cfg(unix)]
        #[test]
        fn finished_is_reported_when_process_exits() {
            let (tx, rx) = speech_channel();
            let sink = CommandSpeechSink::from_command_line("true", tx).unwrap();
            sink.speak(7, "ignored").unwrap();

            let started = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            let finished = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(started.signal, SpeechSignal::Started);
            assert_eq!(finished, SpeechEvent { utterance: 7, signal: SpeechSignal::Finished });
        }

        #[cfg(unix)]
        #[test]
        fn cancel_reports_stopped() {
            let (tx, rx) = speech_channel();
            let sink = CommandSpeechSink::from_command_line("sleep", tx).unwrap();
            sink.speak(3, "30").unwrap();
            sink.cancel();

            let signals: Vec<_> = rx.try_iter().map(|e| e.signal).collect();
            assert_eq!(signals, vec![SpeechSignal::Started, SpeechSignal::Stopped]);
        }
    }
}
