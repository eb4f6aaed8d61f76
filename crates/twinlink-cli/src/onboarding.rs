//! Onboarding tour flag commands. Local only; no backend calls.

use chrono::Utc;
use clap::Subcommand;
use twinlink_core::{AppConfig, OnboardingOutcome, OnboardingStore};

#[derive(Debug, Subcommand)]
pub enum OnboardingCommands {
    /// Show whether the tour has been finished
    Status,
    /// Mark the tour completed
    Complete,
    /// Mark the tour skipped
    Skip,
    /// Show the tour again next time
    Reset,
}

pub(crate) fn run_onboarding(config: &AppConfig, command: &OnboardingCommands) -> anyhow::Result<()> {
    let store = OnboardingStore::new(&config.state_dir);
    match command {
        OnboardingCommands::Status => {
            let record = store.load();
            match (record.completed, record.outcome) {
                (true, Some(OnboardingOutcome::Skipped)) => println!("onboarding: skipped"),
                (true, _) => println!("onboarding: completed"),
                (false, _) => println!("onboarding: pending"),
            }
        }
        OnboardingCommands::Complete => {
            store.finish(OnboardingOutcome::Completed, Utc::now())?;
            println!("onboarding marked completed");
        }
        OnboardingCommands::Skip => {
            store.finish(OnboardingOutcome::Skipped, Utc::now())?;
            println!("onboarding marked skipped");
        }
        OnboardingCommands::Reset => {
            store.reset()?;
            println!("onboarding reset");
        }
    }
    Ok(())
}
