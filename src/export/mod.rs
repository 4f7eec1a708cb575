/*!
 * Document export.
 *
 * - `template`: the main source file rendered from songbook options
 * - `toolchain`: the external three-step build
 * - `pipeline`: gathers songs, runs the build, publishes the result
 */

pub mod pipeline;
pub mod template;
pub mod toolchain;

pub use self::pipeline::{ArtifactLink, CompilationPipeline};
pub use self::template::SongbookTemplate;
pub use self::toolchain::{ProcessToolchain, StepOutput, Toolchain};
