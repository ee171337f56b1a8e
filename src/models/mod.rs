pub mod assessment;
pub mod chunk;
pub mod generation;
pub mod loaders;
pub mod question;

pub use assessment::{Assessment, DeterministicResult, QualityFlag, ValidationResult};
pub use chunk::{Chunk, ExtractedText, MaterialRecord, Metadata, PageText, StoredChunk};
pub use generation::{
    GeneratedQuestion, GenerationJob, GenerationResult, GenerationSpec, JobStatus, RepairPlan,
    RepairProposal,
};
pub use loaders::{load_all_exam_files, load_exam_file, load_generation_job, load_material};
pub use question::{
    BloomLevel, ExamFile, ExamRecord, ParsedQuestion, Question, QuestionOption, QuestionSource, StoredQuestion,
};
