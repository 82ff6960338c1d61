//! Deferred verb/object commands handed to the sentence script.

use log::{debug, warn};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::VmResult;
use crate::opcodes::SENTENCE_CLEAR_VERB;
use crate::vars::{VAR_SENTENCE_SCRIPT, VAR_VERB_SCRIPT};

pub const MAX_SENTENCES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sentence {
    pub verb: i32,
    pub object_a: i32,
    pub object_b: i32,
    pub preposition: bool,
    pub freeze_count: u8,
}

impl Sentence {
    pub fn new(verb: i32, object_a: i32, object_b: i32) -> Self {
        Sentence {
            verb,
            object_a,
            object_b,
            preposition: object_b != 0,
            freeze_count: 0,
        }
    }

    /// "Use X with X" never reaches the sentence script.
    pub fn is_reflexive(&self) -> bool {
        self.preposition && self.object_a == self.object_b
    }
}

/// LIFO buffer; the newest sentence runs first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SentenceQueue {
    entries: Vec<Sentence>,
}

impl SentenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest(&self) -> Option<&Sentence> {
        self.entries.last()
    }

    /// Returns false when the queue is full and the sentence was dropped.
    pub fn push(&mut self, sentence: Sentence) -> bool {
        if self.entries.len() >= MAX_SENTENCES {
            return false;
        }
        self.entries.push(sentence);
        true
    }

    pub fn pop(&mut self) -> Option<Sentence> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn freeze(&mut self) {
        for sentence in &mut self.entries {
            sentence.freeze_count = sentence.freeze_count.saturating_add(1);
        }
    }

    pub fn unfreeze(&mut self) {
        for sentence in &mut self.entries {
            sentence.freeze_count = sentence.freeze_count.saturating_sub(1);
        }
    }
}

impl Engine {
    pub fn do_sentence(&mut self, verb: i32, object_a: i32, object_b: i32) {
        if verb == SENTENCE_CLEAR_VERB {
            self.sentences.clear();
            let script = self.vars.global(VAR_SENTENCE_SCRIPT) as u16;
            self.scheduler.stop_script(script);
            self.log_event("sentence.clear");
            return;
        }

        if self.sentences.push(Sentence::new(verb, object_a, object_b)) {
            self.log_event(format!("sentence.queue {verb} {object_a} {object_b}"));
        } else {
            warn!("sentence queue full, dropping verb {verb} on {object_a}/{object_b}");
        }
    }

    /// Hands the newest sentence to the sentence script once that script is
    /// idle and the sentence is not frozen.
    pub fn check_and_run_sentence_script(&mut self) -> VmResult<()> {
        let script = self.vars.global(VAR_SENTENCE_SCRIPT) as u16;
        if script != 0 && self.scheduler.has_active_instance(script) {
            return Ok(());
        }
        match self.sentences.newest() {
            Some(sentence) if sentence.freeze_count == 0 => {}
            _ => return Ok(()),
        }
        let Some(sentence) = self.sentences.pop() else {
            return Ok(());
        };
        if sentence.is_reflexive() {
            debug!("skipping reflexive sentence {sentence:?}");
            return Ok(());
        }

        self.scheduler.set_current(None);
        if script != 0 {
            self.log_event(format!(
                "sentence.run {} {} {}",
                sentence.verb, sentence.object_a, sentence.object_b
            ));
            self.run_script(
                script,
                false,
                false,
                &[sentence.verb, sentence.object_a, sentence.object_b],
            )?;
        }
        Ok(())
    }

    /// Input entry point: runs the verb script with the click details.
    pub fn run_input_script(&mut self, click_area: i32, code: i32, mode: i32) -> VmResult<()> {
        let script = self.vars.global(VAR_VERB_SCRIPT) as u16;
        if script == 0 {
            return Ok(());
        }
        self.run_script(script, false, false, &[click_area, code, mode])
    }

    /// Unfinished sentences, oldest first.
    pub fn pending_sentences(&self) -> &[Sentence] {
        &self.sentences.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_holds_six_sentences() {
        let mut queue = SentenceQueue::new();
        for verb in 0..MAX_SENTENCES as i32 {
            assert!(queue.push(Sentence::new(verb, 1, 0)));
        }
        assert!(!queue.push(Sentence::new(99, 1, 0)));
        assert_eq!(queue.len(), MAX_SENTENCES);
        assert_eq!(queue.newest().map(|s| s.verb), Some(5));
    }

    #[test]
    fn preposition_follows_second_object() {
        assert!(!Sentence::new(3, 10, 0).preposition);
        assert!(Sentence::new(3, 10, 11).preposition);
        assert!(Sentence::new(3, 10, 10).is_reflexive());
        assert!(!Sentence::new(3, 0, 0).is_reflexive());
    }

    #[test]
    fn freezing_counts_per_sentence() {
        let mut queue = SentenceQueue::new();
        queue.push(Sentence::new(1, 2, 0));
        queue.freeze();
        queue.freeze();
        queue.unfreeze();
        assert_eq!(queue.newest().map(|s| s.freeze_count), Some(1));
        queue.unfreeze();
        queue.unfreeze();
        assert_eq!(queue.newest().map(|s| s.freeze_count), Some(0));
    }
}
