use rand::Rng;

pub fn roll_dice<R: Rng>(rng: &mut R, sides: u8, rolls: u8) -> Vec<u8> {
    (0..rolls).map(|_| rng.gen_range(1..=sides)).collect()
}

/// "a 4 (d20)" for a single die, "2d6: 3 + 4 (total 7)" otherwise.
pub fn roll_summary(sides: u8, results: &[u8]) -> String {
    match results {
        [single] => format!("a {single} (d{sides})"),
        _ => {
            let total: u32 = results.iter().map(|&r| u32::from(r)).sum();
            let faces = results
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(" + ");
            format!("{}d{sides}: {faces} (total {total})", results.len())
        }
    }
}

pub fn flip_coin<R: Rng>(rng: &mut R) -> &'static str {
    if rng.gen_bool(0.5) {
        "heads"
    } else {
        "tails"
    }
}

pub mod commands {
    use super::{flip_coin, roll_dice, roll_summary};
    use crate::{Context, Error};

    use poise::serenity_prelude::Mentionable;

    /// Check that the bot is alive.
    #[poise::command(slash_command)]
    pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
        let latency = ctx.ping().await;

        if latency.is_zero() {
            ctx.say("🏓 Pong!").await?;
        } else {
            ctx.say(format!("🏓 Pong! {}ms", latency.as_millis())).await?;
        }

        Ok(())
    }

    /// Roll some dice for the channel to see.
    ///
    /// Rolls one twenty-sided die unless told otherwise. Up to ten dice with
    /// between two and a hundred sides each.
    #[poise::command(slash_command)]
    pub async fn roll(
        ctx: Context<'_>,
        #[description = "Sides per die (default 20)."]
        #[min = 2]
        #[max = 100]
        sides: Option<u8>,
        #[description = "How many dice (default 1)."]
        #[min = 1]
        #[max = 10]
        rolls: Option<u8>,
    ) -> Result<(), Error> {
        let sides = sides.unwrap_or(20);
        let rolls = rolls.unwrap_or(1);

        let results = roll_dice(&mut rand::thread_rng(), sides, rolls);
        let message = format!(
            "🎲 {} rolled {}.",
            ctx.author().mention(),
            roll_summary(sides, &results)
        );

        ctx.say(message).await?;

        Ok(())
    }

    /// Flip a coin.
    #[poise::command(slash_command)]
    pub async fn coinflip(ctx: Context<'_>) -> Result<(), Error> {
        let side = flip_coin(&mut rand::thread_rng());

        ctx.say(format!("🪙 {} got {}.", ctx.author().mention(), side))
            .await?;

        Ok(())
    }
}
