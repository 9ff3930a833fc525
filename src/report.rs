#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Terminal rendering of an evaluation for `veritas evaluate`.

use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::{prompt::RUBRIC_DIMENSIONS, reconcile::MAX_FINAL_SCORE, types::EvaluationResult};

/// Column width used for free-text cells.
const TEXT_WIDTH: usize = 72;

/// One evaluator row of the score table.
#[derive(Tabled)]
struct ScoreRow {
    /// Evaluator display name.
    #[tabled(rename = "Evaluator")]
    name:     String,
    /// Awarded points.
    #[tabled(rename = "Score")]
    score:    String,
    /// Maximum points for the dimension.
    #[tabled(rename = "Max")]
    max:      String,
    /// Evaluator's analysis.
    #[tabled(rename = "Analysis")]
    analysis: String,
}

/// Renders `result` as a score table followed by the verdict.
pub fn render(result: &EvaluationResult) -> String {
    let rows = result
        .evaluators()
        .into_iter()
        .zip(RUBRIC_DIMENSIONS)
        .map(|(evaluator, (_, max))| ScoreRow {
            name:     evaluator.name.clone(),
            score:    format!("{:.2}", evaluator.score),
            max:      format!("{max:.1}"),
            analysis: evaluator.analysis.clone(),
        })
        .collect::<Vec<_>>();

    let verdict = &result.final_verdict;
    let table = Table::new(&rows)
        .with(Panel::header("Thesis evaluation"))
        .with(Panel::footer(format!(
            "Component total: {:.2}",
            result.component_total()
        )))
        .with(Modify::new(Rows::new(1..)).with(Width::wrap(TEXT_WIDTH).keep_words(true)))
        .with(
            Modify::new(Rows::first())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(Style::modern())
        .to_string();

    let score = format!("{:.2}/{MAX_FINAL_SCORE:.0}", verdict.final_score);
    let score = if verdict.final_score >= 7.0 {
        score.green().bold()
    } else if verdict.final_score >= 5.0 {
        score.yellow().bold()
    } else {
        score.red().bold()
    };

    let mut out = table;
    out.push_str(&format!("\n\n{} {score}\n", "Final score:".bold()));
    out.push_str(&format!("\n{}\n{}\n", "Summary".bold(), verdict.summary));
    out.push_str(&format!("\n{}\n{}\n", "Recommendations".bold(), verdict.recommendations));
    if let Some(message) = &result.message {
        out.push_str(&format!("\n{}\n", message.dimmed()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvaluatorScore, FinalVerdict};

    #[test]
    fn report_lists_every_evaluator_and_the_verdict() {
        colored::control::set_override(false);
        let evaluator = |name: &str, score: f64| {
            EvaluatorScore::builder()
                .name(name)
                .analysis("Análise consistente.")
                .score(score)
                .build()
        };
        let result = EvaluationResult::builder()
            .evaluator_1(evaluator("Avaliador 1 - Metodologia", 2.5))
            .evaluator_2(evaluator("Avaliador 2 - ABNT", 1.5))
            .evaluator_3(evaluator("Avaliador 3 - Originalidade", 1.5))
            .final_verdict(
                FinalVerdict::builder()
                    .summary("Trabalho sólido.")
                    .final_score(6.0)
                    .recommendations("Revisar as referências.")
                    .build(),
            )
            .message("evaluation complete".to_string())
            .build();

        let report = render(&result);
        for needle in [
            "Avaliador 1 - Metodologia",
            "Avaliador 3 - Originalidade",
            "2.50",
            "3.0",
            "Component total: 5.50",
            "Final score: 6.00/10",
            "Trabalho sólido.",
            "Revisar as referências.",
            "evaluation complete",
        ] {
            assert!(report.contains(needle), "report is missing {needle:?}:\n{report}");
        }
    }
}
