pub mod ask;
pub mod knowledge;
pub mod llm;
pub mod serve;
