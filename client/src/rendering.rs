//! Plain-text rendering of a snapshot

use shared::GameState;
use std::io::Write;

pub const SELF_GLYPH: char = '☺';
pub const OTHER_GLYPH: char = 'o';

/// Renders the grid with players drawn over it, then the status line and
/// one score line per player (sorted by identity).
pub fn render_to_string(state: &GameState, identity: &str) -> String {
    let mut out = String::new();

    for (y, row) in state.grid.rows().enumerate() {
        for (x, tile) in row.iter().enumerate() {
            let here = state
                .players
                .values()
                .filter(|p| p.position.x == x && p.position.y == y);
            let mut glyph = None;
            for player in here {
                if player.identity == identity {
                    glyph = Some(SELF_GLYPH);
                    break;
                }
                glyph = Some(OTHER_GLYPH);
            }
            out.push(glyph.unwrap_or_else(|| tile.symbol()));
        }
        out.push('\n');
    }

    out.push_str(&state.status);
    out.push('\n');

    let mut players: Vec<_> = state.players.values().collect();
    players.sort_by(|a, b| a.identity.cmp(&b.identity));
    for player in players {
        let marker = if player.identity == identity { '*' } else { ' ' };
        out.push_str(&format!(
            "{}{} at {} collected {} health {}\n",
            marker, player.identity, player.position, player.collected, player.health
        ));
    }

    out
}

/// Redraws the terminal on every call
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    enabled: bool,
}

impl Renderer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn render(&self, state: &GameState, identity: &str) {
        if !self.enabled {
            return;
        }
        let frame = render_to_string(state, identity);
        let mut stdout = std::io::stdout().lock();
        // clear screen, cursor home
        let _ = write!(stdout, "\x1b[2J\x1b[H{}", frame);
        let _ = writeln!(stdout, "w/a/s/d move, e interact, q quit (press Enter)");
        let _ = stdout.flush();
    }
}
