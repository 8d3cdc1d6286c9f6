//! The display list and texture proxies used by the debug overlay.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Loads textures on demand. A proxy is handed out immediately and filled in once the texture has
/// streamed in.
#[derive(Debug, Default)]
pub struct TextureProxies {
    queued: Vec<u16>,
}

impl TextureProxies {
    pub fn queue_load_texture_proxy(&mut self, id: u16) -> TextureHandle {
        self.queued.push(id);

        let handle = TextureHandle(self.queued.len() as u32);
        log::trace!("queued texture {id} as proxy {handle:?}");

        handle
    }

    /// Texture IDs in the order they were requested.
    pub fn queued(&self) -> &[u16] {
        &self.queued
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gfx {
    SetTexture(TextureHandle),

    /// Draws `glyph` with its top-left corner at `(x, y)`.
    Glyph {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        glyph: u8,
    },
}

/// The frame's display list (`gCurGfx`).
#[derive(Debug, Default)]
pub struct DisplayList {
    commands: Vec<Gfx>,
}

impl DisplayList {
    pub fn push(&mut self, command: Gfx) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Gfx] {
        &self.commands
    }

    /// Iterates over the characters drawn so far.
    pub fn glyphs(&self) -> impl Iterator<Item = u8> + '_ {
        self.commands.iter().filter_map(|command| match command {
            Gfx::Glyph { glyph, .. } => Some(*glyph),
            Gfx::SetTexture(_) => None,
        })
    }

    /// Starts a new frame.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
