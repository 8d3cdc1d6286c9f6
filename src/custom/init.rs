//! Finishes the startup work that `custom_seg_load` displaced: loading the filesystem table and
//! clearing the custom segment's uninitialised data.

use eyre::{Context, Result};

use crate::game::Game;

pub fn custom_init(game: &mut Game) -> Result<()> {
    game.load_filesystem()?;

    let noload = game
        .symbols
        .range("_customSegmentNoloadStart", "_customSegmentNoloadEnd")?;

    log::debug!("zeroing custom segment noload {noload:#x?}");

    game.ram
        .bzero(noload)
        .wrap_err("failed to clear the custom segment")?;

    Ok(())
}

pub fn hook(game: &Game) -> Result<()> {
    game.hooks.init.install(&game.symbols, custom_init)?;
    Ok(())
}
