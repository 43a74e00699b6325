//! Held-out evaluation metrics.

use std::fmt::{Display, Formatter, Write};

use aprender::metrics::classification::{
    accuracy, confusion_matrix, f1_score, precision, recall, Average,
};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::prelude::*;
use crate::reading::{as_classes, Verdict};

/// Rows are the true classes, columns are the predicted ones, both ordered as `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix(pub [[usize; 2]; 2]);

impl ConfusionMatrix {
    /// Pads the estimator's matrix, which only spans the classes seen.
    fn new(truth: &[usize], predicted: &[usize]) -> Self {
        let counts = confusion_matrix(predicted, truth);
        let mut matrix = [[0; 2]; 2];
        for (row, cells) in matrix.iter_mut().enumerate().take(counts.n_rows()) {
            for (column, cell) in cells.iter_mut().enumerate().take(counts.n_cols()) {
                *cell = counts.get(row, column);
            }
        }
        Self(matrix)
    }

    pub const fn get(&self, truth: Verdict, predicted: Verdict) -> usize {
        self.0[truth.as_u8() as usize][predicted.as_u8() as usize]
    }
}

impl Display for ConfusionMatrix {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let [[tn, fp], [fn_, tp]] = self.0;
        let width = [tn, fp, fn_, tp].iter().map(|n| n.to_string().len()).max().unwrap_or(1);
        writeln!(formatter, "[[{:>width$} {:>width$}]", tn, fp, width = width)?;
        write!(formatter, " [{:>width$} {:>width$}]]", fn_, tp, width = width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassScores {
    /// Scores of a single class, undefined ratios are reported as zero.
    fn new(matrix: &ConfusionMatrix, class: Verdict) -> Self {
        let true_positives = matrix.get(class, class);
        let n_predicted: usize = Verdict::ALL.iter().map(|truth| matrix.get(*truth, class)).sum();
        let support: usize = Verdict::ALL.iter().map(|predicted| matrix.get(class, *predicted)).sum();
        let precision = ratio(true_positives, n_predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub struct Evaluation {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,

    /// Indexed by the class value.
    pub classes: [ClassScores; 2],

    pub macro_average: ClassScores,
    pub weighted_average: ClassScores,
}

impl Evaluation {
    pub fn new(truth: &[Verdict], predicted: &[Verdict]) -> Result<Self> {
        if truth.is_empty() || truth.len() != predicted.len() {
            bail!("cannot evaluate {} predictions against {} labels", predicted.len(), truth.len());
        }
        let (truth, predicted) = (as_classes(truth), as_classes(predicted));
        let confusion_matrix = ConfusionMatrix::new(&truth, &predicted);
        let support = truth.len();
        let averaged = |average| ClassScores {
            precision: f64::from(precision(&predicted, &truth, average)),
            recall: f64::from(recall(&predicted, &truth, average)),
            f1: f64::from(f1_score(&predicted, &truth, average)),
            support,
        };
        Ok(Self {
            accuracy: f64::from(accuracy(&predicted, &truth)),
            classes: Verdict::ALL.map(|class| ClassScores::new(&confusion_matrix, class)),
            confusion_matrix,
            macro_average: averaged(Average::Macro),
            weighted_average: averaged(Average::Weighted),
        })
    }

    /// Scores of the feasible class.
    pub const fn positive(&self) -> &ClassScores {
        &self.classes[1]
    }

    pub fn support(&self) -> usize {
        self.classes.iter().map(|scores| scores.support).sum()
    }

    /// Per-class precision, recall and F1 in the familiar plain-text layout.
    pub fn report(&self) -> String {
        let mut report = format!("{:>14} {:>9} {:>9} {:>9} {:>9}\n\n", "", "precision", "recall", "f1-score", "support");
        for class in Verdict::ALL {
            push_report_line(&mut report, &class.to_string(), &self.classes[class.as_u8() as usize]);
        }
        report.push('\n');
        let _ = writeln!(report, "{:>14} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support());
        push_report_line(&mut report, "macro avg", &self.macro_average);
        push_report_line(&mut report, "weighted avg", &self.weighted_average);
        report
    }

    /// Headline metrics of the feasible class as a table.
    pub fn table(&self) -> String {
        let positive = self.positive();
        let rows = [
            MetricRow::new("Accuracy", self.accuracy),
            MetricRow::new("Precision", positive.precision),
            MetricRow::new("Recall", positive.recall),
            MetricRow::new("F1-Score", positive.f1),
        ];
        Table::new(rows).with(Style::ascii()).to_string()
    }
}

fn push_report_line(report: &mut String, name: &str, scores: &ClassScores) {
    let _ = writeln!(
        report,
        "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        name, scores.precision, scores.recall, scores.f1, scores.support,
    );
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "metric")]
    name: &'static str,

    #[tabled(rename = "value")]
    value: String,
}

impl MetricRow {
    fn new(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value: format!("{:.4}", value),
        }
    }
}
