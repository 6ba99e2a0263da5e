use anyhow::{Context, Result};
use tracing::{info, warn};

use super::context::EngineContext;
use crate::cli::{DeregisterArgs, RegisterArgs};

pub fn register(args: RegisterArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;
    let capacity = context
        .engine
        .register_volunteer(&args.volunteer_id, args.capacity)
        .with_context(|| format!("failed to register volunteer {}", args.volunteer_id))?;
    context.save_ranking()?;

    info!(volunteer_id = %args.volunteer_id, capacity, "register completed");
    Ok(())
}

pub fn deregister(args: DeregisterArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;
    let removed = context
        .engine
        .deregister_volunteer(&args.volunteer_id)
        .with_context(|| format!("failed to deregister volunteer {}", args.volunteer_id))?;
    if !removed {
        warn!(volunteer_id = %args.volunteer_id, "volunteer was not in the ranking");
    }
    context.save_ranking()?;
    Ok(())
}
