use clap::Subcommand;

use super::autofix::AutofixArgs;
use super::proofs::ProofsTemplateArgs;
use super::refresh::RefreshArgs;
use super::resolve::ResolveArgs;
use super::serve::ServeArgs;
use super::sync::SyncArgs;
use super::validate::ValidateArgs;
use super::watch::WatchArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Serve the recommendation API and keep the rule table refreshed
    Serve(ServeArgs),

    /// Resolve recommendations for a cart once and print them
    Resolve(ResolveArgs),

    /// Run one rule load cycle and print source health
    Refresh(RefreshArgs),

    /// Check a rule file for structural problems and fit compatibility
    Validate(ValidateArgs),

    /// Replace or remove definite fit mismatches in a rule file
    Autofix(AutofixArgs),

    /// Re-validate a rule file every time it changes
    Watch(WatchArgs),

    /// Write a proofs worksheet for pairs that need compatibility evidence
    ProofsTemplate(ProofsTemplateArgs),

    /// Regenerate the rule file from in-stock catalog products
    Sync(SyncArgs),
}
