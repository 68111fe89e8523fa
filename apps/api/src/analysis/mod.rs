pub mod ats;
pub mod handlers;
pub mod narrative;
pub mod pipeline;
pub mod prompts;
pub mod results;
pub mod skills;
