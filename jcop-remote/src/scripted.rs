//! Scripted card backend
//!
//! Replays queued responses and records every call it receives. Useful for
//! tests and for exercising clients without a reader attached.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::logic::{BackendResult, CardLogic};

/// A call observed by a [`ScriptedCard`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    Start,
    Apdu(Bytes),
    End,
}

/// Shared view of the calls a [`ScriptedCard`] received
///
/// Cloning is cheap; all clones observe the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<CardEvent>>>,
}

impl EventLog {
    /// Snapshot of the events so far
    pub fn events(&self) -> Vec<CardEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn push(&self, event: CardEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Debug)]
enum Step {
    Respond(Bytes),
    Fail(String),
}

/// Card backend that answers from a script
///
/// # Examples
///
/// ```
/// use jcop_remote::ScriptedCard;
///
/// let card = ScriptedCard::new(vec![0x3B, 0x00]).respond(vec![0x90, 0x00]);
/// let log = card.log();
/// assert!(log.is_empty());
/// ```
#[derive(Debug)]
pub struct ScriptedCard {
    atr: Bytes,
    script: VecDeque<Step>,
    log: EventLog,
}

impl ScriptedCard {
    /// Card announcing `atr`, with an empty script
    pub fn new(atr: impl Into<Bytes>) -> Self {
        Self {
            atr: atr.into(),
            script: VecDeque::new(),
            log: EventLog::default(),
        }
    }

    /// Queue a response for the next command
    pub fn respond(mut self, response: impl Into<Bytes>) -> Self {
        self.script.push_back(Step::Respond(response.into()));
        self
    }

    /// Queue a backend failure for the next command
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.script.push_back(Step::Fail(message.into()));
        self
    }

    /// Handle on the call log
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// Commands left in the script
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl CardLogic for ScriptedCard {
    async fn connection_start(&mut self) -> BackendResult<()> {
        self.log.push(CardEvent::Start);
        Ok(())
    }

    async fn connection_end(&mut self) -> BackendResult<()> {
        self.log.push(CardEvent::End);
        Ok(())
    }

    async fn exchange_apdu(&mut self, command: Bytes) -> BackendResult<Bytes> {
        debug!("Scripted card received {}", hex::encode_upper(&command));
        self.log.push(CardEvent::Apdu(command));

        match self.script.pop_front() {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(message.into()),
            None => Err("script exhausted".into()),
        }
    }

    async fn card_atr(&mut self) -> BackendResult<Bytes> {
        Ok(self.atr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_scripted_card_replays_and_records() {
        let mut card = ScriptedCard::new(vec![0x31, 0x41, 0x59])
            .respond(vec![0x27, 0x90, 0x00])
            .fail("reader unplugged");
        let log = card.log();

        card.connection_start().await.unwrap();
        assert_eq!(card.card_atr().await.unwrap().as_ref(), &[0x31, 0x41, 0x59]);

        let response = card.exchange_apdu(Bytes::from_static(&[1, 2])).await.unwrap();
        assert_eq!(response.as_ref(), &[0x27, 0x90, 0x00]);

        let error = card.exchange_apdu(Bytes::from_static(&[3])).await.unwrap_err();
        assert_eq!(error.to_string(), "reader unplugged");

        card.connection_end().await.unwrap();

        assert_eq!(
            log.events(),
            vec![
                CardEvent::Start,
                CardEvent::Apdu(Bytes::from_static(&[1, 2])),
                CardEvent::Apdu(Bytes::from_static(&[3])),
                CardEvent::End,
            ]
        );
        assert_eq!(card.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_error() {
        let mut card = ScriptedCard::new(Bytes::new());
        assert!(card.exchange_apdu(Bytes::from_static(&[0])).await.is_err());
    }
}
