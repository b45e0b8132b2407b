use serde::{Deserialize, Serialize};

/// Tile kinds a map may be built from. `water` and `wall` are non-walkable;
/// `grass` and `forest` are walkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Grass,
    Water,
    Wall,
    Forest,
}

impl TileKind {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            '.' => Some(TileKind::Grass),
            '~' => Some(TileKind::Water),
            '#' => Some(TileKind::Wall),
            '^' => Some(TileKind::Forest),
            _ => None,
        }
    }

    pub fn is_walkable(self) -> bool {
        matches!(self, TileKind::Grass | TileKind::Forest)
    }
}

/// A `height` x `width` grid of tiles plus the map's spawn point, answering
/// walkability queries for a point or a point-with-radius.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
    pub spawn: (f32, f32),
}

impl TileGrid {
    pub fn new(width: usize, height: usize, tiles: Vec<TileKind>, spawn: (f32, f32)) -> Self {
        debug_assert_eq!(tiles.len(), width * height);
        Self {
            width,
            height,
            tiles,
            spawn,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tiles(&self) -> &[TileKind] {
        &self.tiles
    }

    fn tile_at(&self, x: i64, y: i64) -> TileKind {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return TileKind::Wall;
        }
        self.tiles[y as usize * self.width + x as usize]
    }

    /// True iff the tile containing `(x, y)` is walkable. Coordinates
    /// outside the grid are treated as `wall`.
    pub fn walkable(&self, x: f32, y: f32) -> bool {
        self.tile_at(x.floor() as i64, y.floor() as i64).is_walkable()
    }

    /// Conjunction of `walkable` at the five probes centered on `(x, y)`
    /// with radius `r`.
    pub fn walkable_radius(&self, x: f32, y: f32, r: f32) -> bool {
        self.walkable(x, y)
            && self.walkable(x - r, y)
            && self.walkable(x + r, y)
            && self.walkable(x, y - r)
            && self.walkable(x, y + r)
    }
}
