pub(crate) use crate::error::{bail, OgdError, OgdResult};
pub(crate) use crate::progress::ProgressBarBuilder;
pub(crate) use crate::project::Project;
