// `medportal logout`: remove the persisted session.

use colored::Colorize;

use super::{CommandResult, Context};

pub async fn run(ctx: &Context) -> CommandResult {
    let signed_in = ctx.session.rehydrate().await;
    ctx.session.logout().await;

    if signed_in {
        println!("{}", "Signed out.".green());
    } else {
        println!("Not signed in.");
    }
    Ok(())
}
