//! Prompt templates for the generation tasks.

/// Best-price comparison table across exchanges, one row per minute.
pub fn table_prompt(data: &str) -> String {
    format!(
        "You need to analyze the following data: {data}. \
         The final result is a table comparing the best prices across the exchanges. \
         Columns: [Time, Best open, Best close, Best high, Best low]. \
         Cell format: Price (exchange name). \
         THE ANSWER MUST CONTAIN ONLY THE TABLE."
    )
}

pub fn analysis_prompt(data: &str) -> String {
    format!(
        "You need to analyze the following data: {data}. \
         The final result is an analysis of the data. Give a detailed description \
         as well as recommendations for an investor."
    )
}

/// Summary of the work done, built from the two upstream documents.
pub fn report_prompt(table: &str, analysis: &str) -> String {
    format!(
        "You need to write a report on the work done. \
         The final result is a report of what I did. \
         I built a table from the data: {table}, and also wrote an analysis: {analysis}. \
         Write the report as a summary of the work done."
    )
}
