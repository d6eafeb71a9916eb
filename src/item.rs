//! Items and the item factory: kinds, cosmetic shades, seeded randomness.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Item kinds. Matching only ever compares kinds; shade is cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Donut,
    Cookie,
    Croissant,
    Pudding,
    Boba,
    /// Power-up: clears a random batch of cells when selected.
    Burst,
}

impl ItemKind {
    /// Ordered palette the factory draws from. `Burst` is never drawn at random.
    pub const PALETTE: [Self; 5] = [
        Self::Donut,
        Self::Cookie,
        Self::Croissant,
        Self::Pudding,
        Self::Boba,
    ];

    /// Number of pastel shades available for this kind.
    pub fn shade_count(&self) -> u8 {
        match self {
            Self::Donut => 5,
            Self::Cookie => 3,
            Self::Croissant => 3,
            Self::Pudding => 3,
            Self::Boba => 4,
            Self::Burst => 1,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Donut => "🍩",
            Self::Cookie => "🍪",
            Self::Croissant => "🥐",
            Self::Pudding => "🍮",
            Self::Boba => "🧋",
            Self::Burst => "🍫",
        }
    }

    /// Two-column ASCII fallback for terminals without emoji.
    pub fn ascii(&self) -> &'static str {
        match self {
            Self::Donut => "Do",
            Self::Cookie => "Co",
            Self::Croissant => "Cr",
            Self::Pudding => "Pu",
            Self::Boba => "Bo",
            Self::Burst => "**",
        }
    }

    pub fn is_burst(&self) -> bool {
        matches!(self, Self::Burst)
    }
}

/// A grid item. Kind and shade never change after creation; `wiggle` is a
/// transient feedback hint shared with the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub shade: u8,
    pub wiggle: f32,
}

impl Item {
    pub fn new(kind: ItemKind, shade: u8) -> Self {
        Self {
            kind,
            shade: shade % kind.shade_count(),
            wiggle: 0.0,
        }
    }

    pub fn burst() -> Self {
        Self::new(ItemKind::Burst, 0)
    }
}

/// Produces random items from the first `active` kinds of the palette.
/// Owns the session RNG, so every random decision in a game is reproducible from one seed.
#[derive(Debug, Clone)]
pub struct ItemFactory {
    rng: SmallRng,
}

impl ItemFactory {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Uniform kind among the first `active` palette entries, then uniform shade.
    pub fn create_item(&mut self, active: usize) -> Item {
        let usable = active.clamp(1, ItemKind::PALETTE.len());
        let kind = ItemKind::PALETTE[self.rng.gen_range(0..usable)];
        let shade = self.rng.gen_range(0..kind.shade_count());
        Item::new(kind, shade)
    }

    /// Bernoulli trial; `p` is clamped to `[0, 1]`.
    pub fn roll(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Random index below `len`; `None` when `len == 0`.
    pub fn pick(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

impl Default for ItemFactory {
    fn default() -> Self {
        Self::from_entropy()
    }
}
