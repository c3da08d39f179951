// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "leveling/mod.rs"]
pub mod leveling;

#[path = "commands/command_router.rs"]
pub mod commands;

#[path = "responses/mod.rs"]
pub mod responses;
