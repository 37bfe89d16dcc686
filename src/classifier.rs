//! Insight classification
//!
//! Turns a short window of nights into exactly one [`Insight`]:
//! - summary statistics over the present values of each metric
//! - boolean predicates with fixed thresholds
//! - an ordered rule table where the first matching pattern wins
//!
//! The predicates overlap on purpose. Rule order encodes which pattern is the
//! more significant one to surface, so it lives in [`PATTERN_RULES`] rather
//! than in nested conditionals.

use crate::stats::{finite_values, median, sample_std_dev};
use crate::types::{Confidence, ContextHints, Insight, NightObservation, Pattern};
use serde::Serialize;
use tracing::debug;

/// Nights required before any pattern is reported
pub const MIN_NIGHTS: usize = 3;

/// Nights required for a high-confidence pattern
pub const HIGH_CONFIDENCE_NIGHTS: usize = 5;

/// Median duration below this is short sleep (6h30)
pub const SHORT_SLEEP_MINUTES: f64 = 390.0;

/// Duration standard deviation at or above this is high variability
pub const HIGH_VARIABILITY_MINUTES: f64 = 75.0;

/// Median awakenings at or above this is fragmented
pub const FRAGMENTED_AWAKENINGS: f64 = 3.0;

/// Median efficiency below this is fragmented
pub const LOW_EFFICIENCY: f64 = 0.82;

/// Topics picked up from free-text context hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextTopic {
    Stress,
    Caffeine,
    Alcohol,
}

/// Trigger substrings per topic, matched case-insensitively
pub const CONTEXT_VOCABULARY: &[(ContextTopic, &[&str])] = &[
    (ContextTopic::Stress, &["stress", "anx"]),
    (ContextTopic::Caffeine, &["caffeine", "coffee", "energy"]),
    (ContextTopic::Alcohol, &["alcohol", "wine", "beer"]),
];

/// Topics mentioned anywhere in a request's context hints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextMentions {
    pub stress: bool,
    pub caffeine: bool,
    pub alcohol: bool,
}

impl ContextMentions {
    /// Scan every hint field against the vocabulary
    pub fn detect(context: &ContextHints) -> Self {
        let fields: Vec<String> = context.fields().iter().map(|f| f.to_lowercase()).collect();
        let mut mentions = Self::default();

        for (topic, triggers) in CONTEXT_VOCABULARY {
            let hit = fields
                .iter()
                .any(|field| triggers.iter().any(|t| field.contains(t)));
            if hit {
                mentions.set(*topic);
            }
        }

        mentions
    }

    pub fn mentions(&self, topic: ContextTopic) -> bool {
        match topic {
            ContextTopic::Stress => self.stress,
            ContextTopic::Caffeine => self.caffeine,
            ContextTopic::Alcohol => self.alcohol,
        }
    }

    fn set(&mut self, topic: ContextTopic) {
        match topic {
            ContextTopic::Stress => self.stress = true,
            ContextTopic::Caffeine => self.caffeine = true,
            ContextTopic::Alcohol => self.alcohol = true,
        }
    }
}

/// Summary statistics over a window of nights
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepSummary {
    /// Nights in the window, with or without metrics
    pub nights: usize,
    /// Nights that contributed a duration
    pub duration_samples: usize,
    pub median_duration: f64,
    pub stdev_duration: f64,
    pub median_awakenings: f64,
    /// `0.0` when no night carried an efficiency
    pub median_efficiency: f64,
}

impl SleepSummary {
    /// Summarize each metric independently over its present values
    pub fn from_observations(observations: &[NightObservation]) -> Self {
        let durations = finite_values(observations.iter().map(|o| o.duration_min));
        let awakenings = finite_values(observations.iter().map(|o| o.awakenings));
        let efficiencies = finite_values(observations.iter().map(|o| o.sleep_efficiency));

        Self {
            nights: observations.len(),
            duration_samples: durations.len(),
            median_duration: median(&durations),
            stdev_duration: sample_std_dev(&durations),
            median_awakenings: median(&awakenings),
            median_efficiency: median(&efficiencies),
        }
    }

    pub fn short_sleep(&self) -> bool {
        self.median_duration > 0.0 && self.median_duration < SHORT_SLEEP_MINUTES
    }

    pub fn high_variability(&self) -> bool {
        self.stdev_duration >= HIGH_VARIABILITY_MINUTES
    }

    pub fn fragmented(&self) -> bool {
        self.median_awakenings >= FRAGMENTED_AWAKENINGS || self.low_efficiency()
    }

    fn low_efficiency(&self) -> bool {
        self.median_efficiency > 0.0 && self.median_efficiency < LOW_EFFICIENCY
    }
}

/// One entry of the priority table
pub struct PatternRule {
    pub pattern: Pattern,
    pub matches: fn(&SleepSummary) -> bool,
}

/// Patterns in priority order; the first matching rule wins
pub const PATTERN_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: Pattern::RhythmOverload,
        matches: SleepSummary::high_variability,
    },
    PatternRule {
        pattern: Pattern::SleepDebt,
        matches: SleepSummary::short_sleep,
    },
    PatternRule {
        pattern: Pattern::Fragmentation,
        matches: SleepSummary::fragmented,
    },
];

/// Pick the dominant pattern for a summary, falling back to a stable baseline
pub fn select_pattern(summary: &SleepSummary) -> Pattern {
    PATTERN_RULES
        .iter()
        .find(|rule| (rule.matches)(summary))
        .map(|rule| rule.pattern)
        .unwrap_or(Pattern::StableBaseline)
}

/// Rule-based insight classifier
pub struct InsightClassifier;

impl InsightClassifier {
    /// Classify a window of nights into exactly one insight
    pub fn classify(observations: &[NightObservation], context: &ContextHints) -> Insight {
        if observations.len() < MIN_NIGHTS {
            debug!(nights = observations.len(), "not enough nights to classify");
            return insufficient_data(observations.len());
        }

        let summary = SleepSummary::from_observations(observations);
        let mentions = ContextMentions::detect(context);
        let pattern = select_pattern(&summary);

        debug!(
            nights = summary.nights,
            median_duration = summary.median_duration,
            stdev_duration = summary.stdev_duration,
            median_awakenings = summary.median_awakenings,
            median_efficiency = summary.median_efficiency,
            ?pattern,
            "classified sleep window"
        );

        insight_for(pattern, &summary, &mentions)
    }
}

/// Build the insight text for a selected pattern
fn insight_for(pattern: Pattern, summary: &SleepSummary, mentions: &ContextMentions) -> Insight {
    match pattern {
        Pattern::RhythmOverload => rhythm_overload(summary, mentions),
        Pattern::SleepDebt => sleep_debt(summary, mentions),
        Pattern::Fragmentation => fragmentation(summary, mentions),
        Pattern::StableBaseline => stable_baseline(summary),
        Pattern::InsufficientData => insufficient_data(summary.nights),
    }
}

fn pattern_confidence(nights: usize) -> Confidence {
    if nights >= HIGH_CONFIDENCE_NIGHTS {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

fn build(
    pattern: Pattern,
    title: &str,
    why: Vec<String>,
    actions: &[&str],
    confidence: Confidence,
) -> Insight {
    Insight {
        pattern,
        domain: pattern.domain(),
        title: title.to_string(),
        why,
        actions: actions.iter().map(|a| a.to_string()).collect(),
        confidence,
    }
}

/// `412.4` -> `6h52`
fn hours_minutes(minutes: f64) -> String {
    let total = minutes.round() as i64;
    format!("{}h{:02}", total / 60, total % 60)
}

fn insufficient_data(nights: usize) -> Insight {
    let noun = if nights == 1 { "night" } else { "nights" };
    build(
        Pattern::InsufficientData,
        "Log a few more nights",
        vec![format!(
            "Only {nights} {noun} logged so far; at least {MIN_NIGHTS} are needed to spot a pattern."
        )],
        &[
            "Log tonight's sleep, even if it was a rough night.",
            "Add awakenings and an estimate of sleep efficiency when you can.",
            "Note stress, caffeine or alcohol in the drivers field.",
        ],
        Confidence::Low,
    )
}

fn rhythm_overload(summary: &SleepSummary, mentions: &ContextMentions) -> Insight {
    let mut why = vec![format!(
        "Across {} nights your sleep duration swings by about {:.0} minutes (standard deviation).",
        summary.nights, summary.stdev_duration
    )];
    if mentions.stress {
        why.push(
            "You mentioned stress or anxiety, which often squeezes the wind-down before bed."
                .to_string(),
        );
    }

    build(
        Pattern::RhythmOverload,
        "Your sleep length is swinging night to night",
        why,
        &[
            "Pick one wake time and hold it within 30 minutes every day, weekends included.",
            "Protect a 30 to 60 minute low-stimulation pause before bed: no work, no bright screens.",
            "Let bedtime follow sleepiness instead of forcing an early night.",
        ],
        pattern_confidence(summary.nights),
    )
}

fn sleep_debt(summary: &SleepSummary, mentions: &ContextMentions) -> Insight {
    let mut why = vec![format!(
        "Your median sleep over {} nights is {:.0} minutes ({}), under the 6h30 floor.",
        summary.nights,
        summary.median_duration.round(),
        hours_minutes(summary.median_duration)
    )];
    if mentions.caffeine {
        why.push(
            "You mentioned caffeine or energy drinks; late intake delays sleep onset and shortens the night."
                .to_string(),
        );
    }

    build(
        Pattern::SleepDebt,
        "You are running a sleep debt",
        why,
        &[
            "Move bedtime 20 to 30 minutes earlier for the next week.",
            "Set a caffeine cutoff at least 8 hours before bedtime.",
            "Keep the wake time fixed so the extra sleep comes from the evening.",
        ],
        pattern_confidence(summary.nights),
    )
}

fn fragmentation(summary: &SleepSummary, mentions: &ContextMentions) -> Insight {
    let mut why = Vec::with_capacity(3);
    if summary.median_awakenings >= FRAGMENTED_AWAKENINGS {
        why.push(format!(
            "You wake about {:.0} times per night (median over {} nights).",
            summary.median_awakenings, summary.nights
        ));
    }
    if summary.low_efficiency() {
        why.push(format!(
            "Median sleep efficiency is {:.0}%, below the {:.0}% mark.",
            summary.median_efficiency * 100.0,
            LOW_EFFICIENCY * 100.0
        ));
    }
    if mentions.alcohol {
        why.push(
            "You mentioned alcohol, which tends to break up the second half of the night."
                .to_string(),
        );
    }

    build(
        Pattern::Fragmentation,
        "Your nights are broken up",
        why,
        &[
            "If you are awake for more than about 20 minutes, get up and do something calm in dim light until sleepy.",
            "Run a 7-night alcohol-free test and compare your awakenings.",
        ],
        pattern_confidence(summary.nights),
    )
}

fn stable_baseline(summary: &SleepSummary) -> Insight {
    let why = if summary.duration_samples > 0 {
        format!(
            "No dominant disruption across {} nights: median sleep {:.0} minutes, night-to-night swing about {:.0} minutes.",
            summary.nights,
            summary.median_duration.round(),
            summary.stdev_duration
        )
    } else {
        format!("No dominant disruption pattern across {} nights.", summary.nights)
    };

    build(
        Pattern::StableBaseline,
        "Your sleep looks stable",
        vec![why],
        &[
            "Keep logging to build a longer baseline.",
            "Keep your current wake time and wind-down routine.",
        ],
        Confidence::Medium,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nights(durations: &[f64]) -> Vec<NightObservation> {
        durations
            .iter()
            .map(|d| NightObservation {
                duration_min: Some(*d),
                ..Default::default()
            })
            .collect()
    }

    fn hints(notes: &str) -> ContextHints {
        ContextHints {
            notes: notes.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_too_few_nights_is_low_confidence() {
        for n in 0..MIN_NIGHTS {
            // Content that would otherwise match every rule
            let observations: Vec<_> = (0..n)
                .map(|i| NightObservation {
                    duration_min: Some(100.0 + 300.0 * i as f64),
                    awakenings: Some(6.0),
                    sleep_efficiency: Some(0.5),
                    ..Default::default()
                })
                .collect();

            let insight = InsightClassifier::classify(&observations, &hints("stress wine"));
            assert_eq!(insight.pattern, Pattern::InsufficientData);
            assert_eq!(insight.confidence, Confidence::Low);
            assert_eq!(insight.title, "Log a few more nights");
            assert_eq!(insight.why.len(), 1);
        }
    }

    #[test]
    fn test_short_consistent_nights_are_sleep_debt() {
        let observations = nights(&[200.0, 210.0, 195.0, 205.0, 215.0]);
        let insight = InsightClassifier::classify(&observations, &ContextHints::default());

        assert_eq!(insight.pattern, Pattern::SleepDebt);
        assert_eq!(insight.domain, "R2 Sleep debt / insufficient opportunity");
        assert_eq!(insight.confidence, Confidence::High);
        assert!(insight.why[0].contains("205 minutes"));
        assert!(insight.why[0].contains("3h25"));
    }

    #[test]
    fn test_variable_nights_are_rhythm_overload() {
        let observations = nights(&[300.0, 420.0, 250.0, 480.0]);
        let insight = InsightClassifier::classify(&observations, &ContextHints::default());

        assert_eq!(insight.pattern, Pattern::RhythmOverload);
        assert_eq!(insight.confidence, Confidence::Medium);
        assert!(insight.domain.contains("Rhythm overload"));
    }

    #[test]
    fn test_variability_outranks_short_and_fragmented() {
        let observations: Vec<_> = [120.0, 400.0, 150.0, 380.0, 130.0]
            .iter()
            .map(|d| NightObservation {
                duration_min: Some(*d),
                awakenings: Some(5.0),
                sleep_efficiency: Some(0.6),
                ..Default::default()
            })
            .collect();

        let summary = SleepSummary::from_observations(&observations);
        assert!(summary.high_variability());
        assert!(summary.short_sleep());
        assert!(summary.fragmented());

        let insight = InsightClassifier::classify(&observations, &ContextHints::default());
        assert_eq!(insight.pattern, Pattern::RhythmOverload);
        assert_eq!(insight.confidence, Confidence::High);
    }

    #[test]
    fn test_short_sleep_outranks_fragmentation() {
        let observations: Vec<_> = [300.0, 310.0, 305.0]
            .iter()
            .map(|d| NightObservation {
                duration_min: Some(*d),
                awakenings: Some(4.0),
                ..Default::default()
            })
            .collect();

        let insight = InsightClassifier::classify(&observations, &ContextHints::default());
        assert_eq!(insight.pattern, Pattern::SleepDebt);
    }

    #[test]
    fn test_rule_table_order() {
        let order: Vec<Pattern> = PATTERN_RULES.iter().map(|r| r.pattern).collect();
        assert_eq!(
            order,
            vec![
                Pattern::RhythmOverload,
                Pattern::SleepDebt,
                Pattern::Fragmentation
            ]
        );
    }

    #[test]
    fn test_fragmented_by_awakenings() {
        let observations: Vec<_> = (0..4)
            .map(|_| NightObservation {
                duration_min: Some(450.0),
                awakenings: Some(3.0),
                ..Default::default()
            })
            .collect();

        let insight = InsightClassifier::classify(&observations, &hints("Two glasses of WINE"));
        assert_eq!(insight.pattern, Pattern::Fragmentation);
        assert_eq!(insight.confidence, Confidence::Medium);
        assert_eq!(insight.why.len(), 2);
        assert!(insight.why[0].contains("3 times"));
        assert!(insight.why[1].contains("alcohol"));
    }

    #[test]
    fn test_fragmented_by_efficiency_only() {
        let observations: Vec<_> = [0.75, 0.78, 0.80, 0.9, 0.7]
            .iter()
            .map(|e| NightObservation {
                duration_min: Some(460.0),
                sleep_efficiency: Some(*e),
                ..Default::default()
            })
            .collect();

        let insight = InsightClassifier::classify(&observations, &ContextHints::default());
        assert_eq!(insight.pattern, Pattern::Fragmentation);
        assert_eq!(insight.confidence, Confidence::High);
        assert_eq!(insight.why.len(), 1);
        assert!(insight.why[0].contains("78%"));
    }

    #[test]
    fn test_all_fragmentation_reasons_cap_at_three() {
        let observations: Vec<_> = (0..3)
            .map(|_| NightObservation {
                duration_min: Some(450.0),
                awakenings: Some(4.0),
                sleep_efficiency: Some(0.7),
                ..Default::default()
            })
            .collect();

        let insight = InsightClassifier::classify(&observations, &hints("beer"));
        assert_eq!(insight.why.len(), 3);
    }

    #[test]
    fn test_stable_baseline_is_always_medium() {
        let observations = nights(&[470.0, 480.0, 460.0, 475.0, 490.0, 465.0]);
        let insight = InsightClassifier::classify(&observations, &hints("stress"));

        assert_eq!(insight.pattern, Pattern::StableBaseline);
        assert_eq!(insight.confidence, Confidence::Medium);
        assert_eq!(insight.why.len(), 1);
    }

    #[test]
    fn test_nights_without_metrics_are_stable_baseline() {
        let observations = vec![NightObservation::default(); 4];
        let insight = InsightClassifier::classify(&observations, &ContextHints::default());

        assert_eq!(insight.pattern, Pattern::StableBaseline);
        assert!(insight.why[0].contains("4 nights"));
    }

    #[test]
    fn test_missing_metrics_are_independent() {
        // Efficiency missing on some nights must not drop their durations
        let observations = vec![
            NightObservation {
                duration_min: Some(300.0),
                sleep_efficiency: Some(0.95),
                ..Default::default()
            },
            NightObservation {
                duration_min: Some(310.0),
                ..Default::default()
            },
            NightObservation {
                duration_min: Some(320.0),
                ..Default::default()
            },
        ];

        let summary = SleepSummary::from_observations(&observations);
        assert_eq!(summary.duration_samples, 3);
        assert_eq!(summary.median_duration, 310.0);
        assert_eq!(summary.median_efficiency, 0.95);
    }

    #[test]
    fn test_non_finite_values_are_excluded() {
        let observations = vec![
            NightObservation {
                duration_min: Some(f64::NAN),
                awakenings: Some(f64::INFINITY),
                ..Default::default()
            },
            NightObservation {
                duration_min: Some(470.0),
                ..Default::default()
            },
            NightObservation {
                duration_min: Some(480.0),
                ..Default::default()
            },
        ];

        let summary = SleepSummary::from_observations(&observations);
        assert_eq!(summary.duration_samples, 2);
        assert_eq!(summary.median_duration, 475.0);
        assert_eq!(summary.median_awakenings, 0.0);

        let insight = InsightClassifier::classify(&observations, &ContextHints::default());
        assert_eq!(insight.pattern, Pattern::StableBaseline);
    }

    #[test]
    fn test_context_sentences_follow_pattern() {
        let variable = nights(&[300.0, 420.0, 250.0, 480.0]);
        let insight = InsightClassifier::classify(
            &variable,
            &ContextHints {
                primary_driver: "Work ANXIETY".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(insight.why.len(), 2);
        assert!(insight.why[1].contains("stress"));

        let short = nights(&[300.0, 310.0, 305.0]);
        let insight = InsightClassifier::classify(
            &short,
            &ContextHints {
                secondary_driver: "energy drinks".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(insight.why.len(), 2);
        assert!(insight.why[1].contains("caffeine"));

        // Alcohol only matters for fragmentation
        let insight = InsightClassifier::classify(&short, &hints("wine"));
        assert_eq!(insight.why.len(), 1);
    }

    #[test]
    fn test_context_mentions_detect() {
        let mentions = ContextMentions::detect(&ContextHints {
            primary_driver: "Stressful week".to_string(),
            secondary_driver: String::new(),
            notes: "late Coffee".to_string(),
        });
        assert!(mentions.mentions(ContextTopic::Stress));
        assert!(mentions.mentions(ContextTopic::Caffeine));
        assert!(!mentions.mentions(ContextTopic::Alcohol));

        assert_eq!(
            ContextMentions::detect(&ContextHints::default()),
            ContextMentions::default()
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let observations = nights(&[300.0, 420.0, 250.0, 480.0, 390.0]);
        let context = hints("stress");
        let first = InsightClassifier::classify(&observations, &context);
        let second = InsightClassifier::classify(&observations, &context);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_duration_is_not_short_sleep() {
        let summary = SleepSummary::from_observations(&nights(&[0.0, 0.0, 0.0]));
        assert!(!summary.short_sleep());
    }

    #[test]
    fn test_insight_for_each_pattern() {
        let summary = SleepSummary::from_observations(&nights(&[470.0, 480.0, 460.0]));
        let mentions = ContextMentions::default();

        let insufficient = insight_for(Pattern::InsufficientData, &summary, &mentions);
        assert_eq!(insufficient.pattern, Pattern::InsufficientData);
        assert_eq!(insufficient.confidence, Confidence::Low);

        for pattern in [
            Pattern::RhythmOverload,
            Pattern::SleepDebt,
            Pattern::Fragmentation,
            Pattern::StableBaseline,
        ] {
            let insight = insight_for(pattern, &summary, &mentions);
            assert_eq!(insight.pattern, pattern);
            assert_eq!(insight.domain, pattern.domain());
        }
    }

    #[test]
    fn test_hours_minutes() {
        assert_eq!(hours_minutes(412.4), "6h52");
        assert_eq!(hours_minutes(205.0), "3h25");
        assert_eq!(hours_minutes(60.0), "1h00");
    }
}
