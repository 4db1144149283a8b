pub mod a1;
pub mod cell;
pub mod form_context;
pub mod loaders;
pub mod question;
pub mod report;
pub mod resources;
pub mod settings;
pub mod student;
pub mod submission;

pub use a1::{column_to_letters, letters_to_column, A1ParseError, A1Range, CellRef};
pub use cell::{CellFormat, CellValue, HorizontalAlignment};
pub use form_context::FormContext;
pub use loaders::load_settings;
pub use question::{CreatedQuestion, QuestionKind, QuestionSpec, ScaleSettings, TaggedQuestion};
pub use report::{CellCheck, PreviewReport, Status, StatusResult};
pub use resources::{
    Assignment, AssignmentState, ClassroomStudent, Course, CreatedAssignment, Folder,
    FormHandle, FormSettings, Topic,
};
pub use settings::GenerationSettings;
pub use student::{Group, Student};
pub use submission::{
    Answer, CellWrite, FormNotification, SkippedWrite, SubmissionEvent, SubmissionRecord,
    WriteKind,
};
