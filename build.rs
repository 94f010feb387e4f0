use std::error::Error;

// Emits VERGEN_BUILD_TIMESTAMP and VERGEN_GIT_SHA for `rfdeploy --version`.
// Outside a git checkout vergen falls back to placeholder values.
fn main() -> Result<(), Box<dyn Error>> {
    vergen_gitcl::Emitter::default()
        .add_instructions(
            &vergen_gitcl::BuildBuilder::default()
                .build_timestamp(true)
                .build()?,
        )?
        .add_instructions(&vergen_gitcl::GitclBuilder::default().sha(true).build()?)?
        .emit()?;
    Ok(())
}
