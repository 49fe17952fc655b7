pub mod resume_data;
pub mod response;

pub use resume_data::{Education, FieldIssue, PersonalInfo, ResumeData, WorkExperience};
