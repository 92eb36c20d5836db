//! Scoring ledger: answered/correct tallies with per-question idempotency.

use std::collections::BTreeSet;

use studysnap_core::types::{QuizResult, percentage};

/// What a call to [`ScoringLedger::record_answer`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { correct: bool },
    /// The question was already answered; nothing changed.
    Duplicate,
    /// No such question in this quiz; nothing changed.
    OutOfRange,
}

/// Counts only ever grow, and `correct <= answered <= total` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringLedger {
    total: usize,
    answered: usize,
    correct: usize,
    answered_indices: BTreeSet<usize>,
}

impl ScoringLedger {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record_answer(
        &mut self,
        question_index: usize,
        selected: usize,
        correct_index: usize,
    ) -> RecordOutcome {
        if question_index >= self.total {
            return RecordOutcome::OutOfRange;
        }
        if !self.answered_indices.insert(question_index) {
            return RecordOutcome::Duplicate;
        }

        let correct = selected == correct_index;
        self.answered += 1;
        if correct {
            self.correct += 1;
        }
        RecordOutcome::Recorded { correct }
    }

    pub fn is_answered(&self, question_index: usize) -> bool {
        self.answered_indices.contains(&question_index)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    /// `round(correct / total * 100)`; `None` for an empty quiz.
    pub fn percentage(&self) -> Option<u32> {
        percentage(self.correct, self.total)
    }

    pub fn result(&self) -> Option<QuizResult> {
        QuizResult::new(self.total, self.correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_of_three() {
        let mut ledger = ScoringLedger::new(3);
        assert_eq!(ledger.record_answer(0, 1, 1), RecordOutcome::Recorded { correct: true });
        assert_eq!(ledger.record_answer(1, 0, 2), RecordOutcome::Recorded { correct: false });
        assert_eq!(ledger.record_answer(2, 3, 3), RecordOutcome::Recorded { correct: true });
        assert_eq!(ledger.answered(), 3);
        assert_eq!(ledger.correct(), 2);
        assert_eq!(ledger.percentage(), Some(67));

        let result = ledger.result().unwrap();
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.correct_answers, 2);
        assert_eq!(result.score_percentage, 67);
    }

    #[test]
    fn test_duplicate_is_noop() {
        let mut ledger = ScoringLedger::new(2);
        ledger.record_answer(0, 0, 0);
        let before = ledger.clone();

        // Second answer for the same question, even a different choice
        assert_eq!(ledger.record_answer(0, 2, 0), RecordOutcome::Duplicate);
        assert_eq!(ledger.record_answer(0, 0, 0), RecordOutcome::Duplicate);
        assert_eq!(ledger, before);
        assert!(ledger.is_answered(0));
        assert!(!ledger.is_answered(1));
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let mut ledger = ScoringLedger::new(1);
        assert_eq!(ledger.record_answer(1, 0, 0), RecordOutcome::OutOfRange);
        assert_eq!(ledger.answered(), 0);
    }

    #[test]
    fn test_empty_ledger_has_no_percentage() {
        let ledger = ScoringLedger::new(0);
        assert_eq!(ledger.percentage(), None);
        assert!(ledger.result().is_none());
    }

    #[test]
    fn test_counts_stay_ordered() {
        let mut ledger = ScoringLedger::new(10);
        for i in 0..25 {
            ledger.record_answer(i % 12, i % 4, (i * 3) % 4);
            assert!(ledger.correct() <= ledger.answered());
            assert!(ledger.answered() <= ledger.total());
        }
        assert_eq!(ledger.answered(), 10);
    }
}
