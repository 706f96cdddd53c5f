use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        common::{
            answer::selections,
            question::{
                Question, QuestionId, QuestionOption, QuestionType, OTHER_CONTENT,
                OTHER_SERIAL_NUM,
            },
            survey::SurveyId,
        },
        db::answer_sheet::AnswerSheet,
        pagination::Pagination,
        store::{DefinitionStore, ResponseStore},
    },
};

/// The count for one option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub serial_num: u32,
    pub content: String,
    pub count: u64,
}

/// Option counts for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTally {
    pub serial_num: u32,
    pub subject: String,
    pub question_type: QuestionType,
    pub options: Vec<OptionTally>,
}

/// One page of question tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub entries: Vec<QuestionTally>,
    /// Number of question tallies across all pages.
    pub total_entries: usize,
    /// Number of answer sheets folded into the tallies.
    pub total_responses: usize,
    pub total_pages: usize,
}

/// Folds a survey's answer sheets into per-option counts.
pub struct StatisticsAggregator {
    definitions: Arc<dyn DefinitionStore>,
    responses: Arc<dyn ResponseStore>,
}

impl StatisticsAggregator {
    pub fn new(definitions: Arc<dyn DefinitionStore>, responses: Arc<dyn ResponseStore>) -> Self {
        Self {
            definitions,
            responses,
        }
    }

    /// Tally every stored sheet of the survey and return the requested page.
    ///
    /// Recomputed from the stored sheets on every call.
    pub async fn aggregate(
        &self,
        survey_id: SurveyId,
        pagination: Pagination,
    ) -> Result<StatisticsReport> {
        if self.definitions.survey(survey_id).await?.is_none() {
            return Err(Error::not_found(format!("Survey with ID '{survey_id}'")));
        }

        // Options come embedded in each question, so no per-question reads.
        let questions: Vec<(Question, Vec<QuestionOption>)> = self
            .definitions
            .questions_by_survey(survey_id)
            .await?
            .into_iter()
            .map(|mut question| {
                let options = std::mem::take(&mut question.options);
                (question, options)
            })
            .collect();
        let sheets = self.responses.list_by_survey(survey_id).await?;
        debug!(
            "Tallying {} answer sheets over {} questions of survey {survey_id}",
            sheets.len(),
            questions.len()
        );

        let mut entries = tally(&questions, &sheets);
        let total_entries = entries.len();
        let page = pagination.bounds(total_entries);
        entries.truncate(page.end);
        entries.drain(..page.start);

        Ok(StatisticsReport {
            entries,
            total_entries,
            total_responses: sheets.len(),
            total_pages: pagination.total_pages(total_entries),
        })
    }
}

/// Counts for one question while folding.
struct Counts<'a> {
    question: &'a Question,
    options: &'a [QuestionOption],
    by_content: HashMap<&'a str, usize>,
    counts: Vec<u64>,
    other: u64,
}

impl<'a> Counts<'a> {
    fn new(question: &'a Question, options: &'a [QuestionOption]) -> Self {
        let by_content = options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.serial_num != OTHER_SERIAL_NUM)
            .map(|(i, option)| (option.content.as_str(), i))
            .collect();
        Self {
            question,
            options,
            by_content,
            counts: vec![0; options.len()],
            other: 0,
        }
    }

    fn record(&mut self, content: &str) {
        for choice in selections(content) {
            match self.by_content.get(choice) {
                Some(&i) => self.counts[i] += 1,
                None => self.other += 1,
            }
        }
    }

    fn finish(self) -> QuestionTally {
        let mut options: Vec<OptionTally> = self
            .options
            .iter()
            .zip(self.counts)
            .filter(|(option, _)| option.serial_num != OTHER_SERIAL_NUM)
            .map(|(option, count)| OptionTally {
                serial_num: option.serial_num,
                content: option.content.clone(),
                count,
            })
            .collect();
        options.sort_by_key(|option| option.serial_num);
        if self.question.other_option {
            options.insert(
                0,
                OptionTally {
                    serial_num: OTHER_SERIAL_NUM,
                    content: OTHER_CONTENT.to_string(),
                    count: self.other,
                },
            );
        }
        QuestionTally {
            serial_num: self.question.serial_num,
            subject: self.question.subject.clone(),
            question_type: self.question.question_type,
            options,
        }
    }
}

/// Fold `sheets` into one tally per question, ordered by question serial number.
///
/// Answers to questions that are not choice questions, or that are no longer
/// part of the survey, are ignored.
pub fn tally(
    questions: &[(Question, Vec<QuestionOption>)],
    sheets: &[AnswerSheet],
) -> Vec<QuestionTally> {
    let mut counts: HashMap<QuestionId, Counts<'_>> = questions
        .iter()
        .map(|(question, options)| (question.id, Counts::new(question, options)))
        .collect();

    for answer in sheets.iter().flat_map(|sheet| &sheet.answers) {
        if let Some(counts) = counts.get_mut(&answer.question_id) {
            if counts.question.question_type.is_choice() {
                counts.record(&answer.content);
            }
        }
    }

    let mut tallies: Vec<QuestionTally> = counts.into_values().map(Counts::finish).collect();
    tallies.sort_by_key(|tally| tally.serial_num);
    tallies
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};

    use crate::{
        clock::MockClock,
        model::{
            common::{answer::AnswerValue, survey::Survey},
            quota::{MemoryCounterCache, QuotaLedger},
            store::MemoryStore,
            submission::{SubmissionPipeline, SubmittedAnswer},
        },
    };

    use super::*;

    fn counts(tally: &QuestionTally) -> Vec<(&str, u64)> {
        tally
            .options
            .iter()
            .map(|o| (o.content.as_str(), o.count))
            .collect()
    }

    fn with_options(question: Question) -> (Question, Vec<QuestionOption>) {
        let options = question.options.clone();
        (question, options)
    }

    #[test]
    fn multi_choice_counts_each_selection() {
        let q =
            with_options(Question::example(1, 1, QuestionType::MultiChoice, &["A", "B", "C"]));
        let sheets = [AnswerSheet::example(1, &[(1, "A┋C")])];
        let tallies = tally(&[q], &sheets);
        assert_eq!(counts(&tallies[0]), vec![("A", 1), ("B", 0), ("C", 1)]);
    }

    #[test]
    fn other_bucket_only_when_enabled() {
        let with = with_options(
            Question::example(1, 1, QuestionType::SingleChoice, &["A", "B"]).with_other(),
        );
        let without =
            with_options(Question::example(2, 1, QuestionType::SingleChoice, &["A", "B"]));
        let sheets = [
            AnswerSheet::example(1, &[(1, "Z"), (2, "Z")]),
            AnswerSheet::example(1, &[(1, "B"), (2, "B")]),
        ];
        let tallies = tally(&[with, without], &sheets);

        assert_eq!(
            counts(&tallies[0]),
            vec![(OTHER_CONTENT, 1), ("A", 0), ("B", 1)]
        );
        assert_eq!(tallies[0].options[0].serial_num, OTHER_SERIAL_NUM);
        assert_eq!(counts(&tallies[1]), vec![("A", 0), ("B", 1)]);
    }

    #[test]
    fn unanswered_and_text_questions_still_appear() {
        let choice =
            with_options(Question::example(1, 1, QuestionType::SingleChoice, &["A"]).serial(2));
        let text = with_options(Question::example(2, 1, QuestionType::ShortText, &[]).serial(1));
        let sheets = [AnswerSheet::example(1, &[(2, "free text"), (9, "A")])];
        let tallies = tally(&[choice, text], &sheets);

        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].serial_num, 1);
        assert!(tallies[0].options.is_empty());
        assert_eq!(counts(&tallies[1]), vec![("A", 0)]);
    }

    #[test]
    fn blank_choice_answers_count_nothing() {
        let q =
            with_options(Question::example(1, 1, QuestionType::MultiChoice, &["A"]).with_other());
        let sheets = [AnswerSheet::example(1, &[(1, "")])];
        let tallies = tally(&[q], &sheets);
        assert_eq!(counts(&tallies[0]), vec![(OTHER_CONTENT, 0), ("A", 0)]);
    }

    #[test]
    fn options_sorted_by_serial() {
        let mut question = Question::example(1, 1, QuestionType::SingleChoice, &["A", "B", "C"]);
        question.options.reverse();
        let q = with_options(question);
        let tallies = tally(&[q], &[]);
        let serials: Vec<_> = tallies[0].options.iter().map(|o| o.serial_num).collect();
        assert_eq!(serials, vec![1, 2, 3]);
    }

    fn store_with_questions(n: u32) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.add_survey(Survey::example(1, Utc::now()));
        for id in 1..=n {
            store.add_question(Question::example(id, 1, QuestionType::SingleChoice, &["Y", "N"]));
        }
        store
    }

    #[rocket::async_test]
    async fn pages_are_clamped() {
        let store = store_with_questions(25);
        let aggregator = StatisticsAggregator::new(store.clone(), store.clone());
        let page = |n| Pagination::new(n, 10).unwrap();

        let first = aggregator.aggregate(1, page(1)).await.unwrap();
        let serials: Vec<_> = first.entries.iter().map(|e| e.serial_num).collect();
        assert_eq!(serials, (1..=10).collect::<Vec<_>>());
        assert_eq!(first.total_entries, 25);
        assert_eq!(first.total_pages, 3);

        let third = aggregator.aggregate(1, page(3)).await.unwrap();
        let serials: Vec<_> = third.entries.iter().map(|e| e.serial_num).collect();
        assert_eq!(serials, (21..=25).collect::<Vec<_>>());

        let fourth = aggregator.aggregate(1, page(4)).await.unwrap();
        assert!(fourth.entries.is_empty());
        assert_eq!(fourth.total_entries, 25);
    }

    #[rocket::async_test]
    async fn aggregation_is_repeatable() {
        let store = store_with_questions(3);
        store.add_sheet(AnswerSheet::example(1, &[(1, "Y"), (2, "N")]));
        store.add_sheet(AnswerSheet::example(1, &[(1, "Y"), (3, "maybe")]));
        let aggregator = StatisticsAggregator::new(store.clone(), store.clone());

        let first = aggregator.aggregate(1, Pagination::default()).await.unwrap();
        let second = aggregator.aggregate(1, Pagination::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_responses, 2);
        assert_eq!(counts(&first.entries[0]), vec![("Y", 2), ("N", 0)]);
    }

    #[rocket::async_test]
    async fn options_are_read_with_their_questions() {
        let store = store_with_questions(40);
        store.add_sheet(AnswerSheet::example(1, &[(1, "N"), (40, "Y")]));
        let aggregator = StatisticsAggregator::new(store.clone(), store.clone());

        let report = aggregator
            .aggregate(1, Pagination::new(4, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(store.option_reads(), 0);
        assert_eq!(report.total_responses, 1);
        assert_eq!(counts(&report.entries[9]), vec![("Y", 1), ("N", 0)]);
    }

    #[rocket::async_test]
    async fn unknown_survey_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = StatisticsAggregator::new(store.clone(), store);
        let result = aggregator.aggregate(5, Pagination::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn daily_limit_scenario() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let ten = offset
            .with_ymd_and_hms(2024, 6, 3, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let clock = MockClock::new(ten);
        let store = Arc::new(MemoryStore::new());
        store.add_survey(Survey::example(1, ten).with_limits(1, 0));
        store.add_question(Question::example(1, 1, QuestionType::SingleChoice, &["X", "Y"]));
        let cache = MemoryCounterCache::new(Arc::new(clock.clone()));
        let ledger = Arc::new(QuotaLedger::new(Arc::new(cache), offset));
        let pipeline = SubmissionPipeline::new(store.clone(), store.clone(), ledger);
        let aggregator = StatisticsAggregator::new(store.clone(), store.clone());
        let pick = |choice: &str| {
            vec![SubmittedAnswer {
                question_id: 1,
                value: AnswerValue::Text(choice.to_string()),
            }]
        };

        pipeline.submit(1, "r1", pick("X"), ten).await.unwrap();
        let eleven = ten + chrono::Duration::hours(1);
        clock.set(eleven);
        let second = pipeline.submit(1, "r1", pick("Y"), eleven).await;
        assert!(matches!(second, Err(Error::QuotaExceeded { .. })));

        let report = aggregator.aggregate(1, Pagination::default()).await.unwrap();
        assert_eq!(counts(&report.entries[0]), vec![("X", 1), ("Y", 0)]);
        assert_eq!(report.total_responses, 1);
    }
}
