//! `partspec schema` — print the draft schema the LLM path enforces.

use partspec_extract::llm::draft_schema;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&draft_schema())?);
    Ok(())
}
