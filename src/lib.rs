//! Lane-parallel shader translation.
//!
//! This crate ties the workspace together: [`lanewise_vec`] provides the lane vector value
//! model and [`lanewise_soa`] the structure-of-arrays translator built on it. The two helpers
//! below cover the common one-shot uses.

pub use lanewise_soa as soa;
pub use lanewise_vec as vec;

use lanewise_soa::{
    LaneEvaluator, ListingBuilder, Program, SoaTranslator, TranslateError, TranslateOptions,
    TranslateStats, Translation,
};
use lanewise_vec::LaneVec;

/// Runs `program` over the lanes of `evaluator` and returns the resulting outputs.
pub fn evaluate(
    program: &Program,
    evaluator: &mut LaneEvaluator,
    options: TranslateOptions,
) -> Result<Translation<LaneVec>, TranslateError> {
    SoaTranslator::new(evaluator, options).translate(program)
}

/// Translates `program` for `lanes` lanes into a textual SSA listing.
pub fn listing(
    program: &Program,
    lanes: usize,
    options: TranslateOptions,
) -> Result<(String, TranslateStats), TranslateError> {
    let mut builder = ListingBuilder::new(lanes);
    let stats = SoaTranslator::new(&mut builder, options)
        .translate(program)?
        .stats;
    Ok((builder.finish(), stats))
}
