//! Rubric prompt for the judge
//!
//! The rubric is fixed data; [`build`] renders it around a question,
//! reference answer and candidate answer. Rendering is pure, so the same
//! inputs always give byte-identical prompts.

use std::fmt::Write;

use super::{JUDGE_NAME, JUDGE_VERSION};

/// A scored dimension with its 0-100 banding, highest band first
#[derive(Debug, Clone, Copy)]
pub struct RubricDimension {
    pub name: &'static str,
    pub bands: [(&'static str, &'static str); 6],
}

/// A category of defect and the points it costs
#[derive(Debug, Clone, Copy)]
pub struct Deduction {
    pub defect: &'static str,
    pub min_points: u8,
    pub max_points: u8,
}

pub const RUBRIC: [RubricDimension; 3] = [
    RubricDimension {
        name: "ACCURACY",
        bands: [
            ("100", "Flawless agreement with the reference; every fact correct"),
            ("95-99", "Correct apart from one or two very minor imprecisions"),
            ("90-94", "Core concepts correct but some nuance or detail missing"),
            ("85-89", "Generally accurate with noticeable omissions or simplifications"),
            ("80-84", "Main points accurate but several details missing"),
            ("Below 80", "Significant gaps or factual errors"),
        ],
    },
    RubricDimension {
        name: "CLARITY",
        bands: [
            ("100", "Perfectly structured and immediately understandable to a student"),
            ("95-99", "Very clear; wording could improve slightly"),
            ("90-94", "Clear but could be more precise or better organized"),
            ("85-89", "Understandable but verbose or somewhat unclear"),
            ("80-84", "Gets the point across with evident clarity problems"),
            ("Below 80", "Confusing or poorly structured"),
        ],
    },
    RubricDimension {
        name: "COMPLETENESS",
        bands: [
            ("100", "Covers every key concept of the reference at full depth"),
            ("95-99", "One very minor detail missing"),
            ("90-94", "Most key concepts covered but lacking some depth"),
            ("85-89", "Main points covered with several details omitted"),
            ("80-84", "Core covered but important supporting information missing"),
            ("Below 80", "Significant omissions"),
        ],
    },
];

pub const DEDUCTIONS: [Deduction; 6] = [
    Deduction { defect: "Missing mathematical notation", min_points: 5, max_points: 10 },
    Deduction { defect: "Oversimplified explanation", min_points: 5, max_points: 15 },
    Deduction { defect: "Missing examples that the reference provides", min_points: 5, max_points: 10 },
    Deduction { defect: "Awkward or unclear phrasing", min_points: 3, max_points: 7 },
    Deduction { defect: "Missing technical terms used in the reference", min_points: 5, max_points: 10 },
    Deduction { defect: "Different structure that reduces clarity", min_points: 3, max_points: 8 },
];

/// The five keys the judge must return, in order
pub const OUTPUT_KEYS: [&str; 5] = [
    "accuracy_score",
    "clarity_score",
    "completeness_score",
    "reasoning",
    "model_version",
];

/// Render the judge prompt for one candidate answer
pub fn build(question: &str, reference: &str, candidate: &str) -> String {
    let mut prompt = String::with_capacity(4096 + question.len() + reference.len() + candidate.len());

    write_prompt(&mut prompt, question, reference, candidate).expect("writing to a String cannot fail");
    prompt
}

fn write_prompt(out: &mut String, question: &str, reference: &str, candidate: &str) -> std::fmt::Result {
    writeln!(
        out,
        "You are {}, a strict grader of educational answers. Compare the candidate answer \
         against the expert reference answer and score it.",
        JUDGE_NAME
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Be exacting. A score of 100 is reserved for flawless answers and should be rare. \
         Look for anything missing, different, imprecise or unclear relative to the reference."
    )?;
    writeln!(out)?;

    writeln!(out, "QUESTION:\n{}\n", question)?;
    writeln!(out, "EXPERT REFERENCE ANSWER (ground truth):\n{}\n", reference)?;
    writeln!(out, "CANDIDATE ANSWER TO EVALUATE:\n{}\n", candidate)?;

    writeln!(out, "SCORING RUBRIC (each dimension scored independently, 0-100):")?;
    for (i, dimension) in RUBRIC.iter().enumerate() {
        writeln!(out, "\n{}. {} (0-100):", i + 1, dimension.name)?;
        for (band, meaning) in &dimension.bands {
            writeln!(out, "   - {}: {}", band, meaning)?;
        }
    }
    writeln!(out)?;

    writeln!(out, "DEDUCTIONS:")?;
    for deduction in &DEDUCTIONS {
        writeln!(
            out,
            "- {}: -{} to -{} points",
            deduction.defect, deduction.min_points, deduction.max_points
        )?;
    }
    writeln!(out)?;

    writeln!(out, "REASONING FORMAT (MANDATORY):")?;
    writeln!(out, "Your reasoning MUST contain two sections:")?;
    writeln!(out, "1. **Strengths**: what the candidate answer does well.")?;
    writeln!(
        out,
        "2. **Drawbacks**: the specific problems found. This section is REQUIRED whenever \
         any score is below 100. List each missing detail, unclear phrase, structural \
         difference, oversimplification, and missing example or notation."
    )?;
    writeln!(
        out,
        "A response that scores below 100 without a Drawbacks section is invalid."
    )?;
    writeln!(out)?;
    writeln!(out, "Example reasoning:")?;
    writeln!(
        out,
        "\"**Strengths**: Correctly states the core concept.\n\n**Drawbacks**:\n\
         - Omits the formal notation used in the reference\n\
         - Oversimplifies the mechanism\n\
         - Gives no worked example\""
    )?;
    writeln!(out)?;

    writeln!(
        out,
        "OUTPUT: respond with exactly one JSON object and nothing else, with exactly these keys:"
    )?;
    writeln!(out, "{{")?;
    writeln!(out, "    \"{}\": <number 0-100>,", OUTPUT_KEYS[0])?;
    writeln!(out, "    \"{}\": <number 0-100>,", OUTPUT_KEYS[1])?;
    writeln!(out, "    \"{}\": <number 0-100>,", OUTPUT_KEYS[2])?;
    writeln!(out, "    \"{}\": \"<Strengths and Drawbacks as described above>\",", OUTPUT_KEYS[3])?;
    writeln!(out, "    \"{}\": \"{}\"", OUTPUT_KEYS[4], JUDGE_VERSION)?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    write!(
        out,
        "Remember: be strict, and if any score is below 100 you MUST list specific drawbacks."
    )
}
