use macroquad::prelude::*;
use shared::{Pong, Rectangle, Side};

/// Connection details drawn on top of the arena.
#[derive(Debug, Clone, Default)]
pub struct HudState {
    pub side: Option<Side>,
    pub joined: bool,
    pub last_seq: Option<u64>,
    pub accepted: u64,
    pub discarded: u64,
    pub players: usize,
    pub fps: i32,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Self {
        Renderer { width, height }
    }

    pub fn render(&mut self, pong: &Pong, hud: &HudState) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let scale = (self.width / pong.size().x, self.height / pong.size().y);

        self.draw_midline();

        for paddle in pong.paddles() {
            let color = if Some(paddle.side()) == hud.side {
                GREEN
            } else {
                Color::from_rgba(255, 68, 68, 255)
            };
            self.draw_body(&paddle.body.bounding_box(), scale, color);
        }

        self.draw_body(&pong.ball.body.bounding_box(), scale, WHITE);
        self.draw_ui(hud);
    }

    fn draw_midline(&mut self) {
        let x = self.width / 2.0;
        let mut y = 0.0;
        while y < self.height {
            draw_line(x, y, x, y + 10.0, 2.0, Color::from_rgba(68, 68, 68, 255));
            y += 20.0;
        }
    }

    fn draw_body(&mut self, rect: &Rectangle, scale: (f32, f32), color: Color) {
        let (x, y, w, h) = to_screen(rect, scale);
        draw_rectangle(x, y, w, h, color);
        draw_rectangle_lines(x, y, w, h, 1.0, WHITE);
    }

    fn draw_ui(&mut self, hud: &HudState) {
        let y_start = 10.0;

        let connection_color = if hud.joined { GREEN } else { RED };
        draw_rectangle(10.0, y_start, 8.0, 8.0, connection_color);
        let side = hud.side.map_or("-".to_string(), |side| side.to_string());
        draw_text(&format!("CON {}", side), 20.0, y_start + 8.0, 12.0, WHITE);

        let seq = hud.last_seq.map_or("-".to_string(), |seq| seq.to_string());
        let sync_text = format!(
            "seq {}  applied {}  stale {}",
            seq, hud.accepted, hud.discarded
        );
        draw_text(&sync_text, 10.0, y_start + 25.0, 12.0, WHITE);

        let player_y = y_start + 35.0;
        for i in 0..hud.players.min(4) {
            draw_rectangle(
                10.0 + (i as f32) * 4.0,
                player_y,
                3.0,
                3.0,
                Color::from_rgba(0, 170, 255, 255),
            );
        }
        let player_text = format!("{} players  {} fps", hud.players, hud.fps);
        draw_text(&player_text, 30.0, player_y + 4.0, 12.0, WHITE);
    }
}

/// Arena rectangle to window `(x, y, w, h)`.
fn to_screen(rect: &Rectangle, scale: (f32, f32)) -> (f32, f32, f32, f32) {
    let top_left = rect.top_left();
    let size = rect.size();
    (
        top_left.x * scale.0,
        top_left.y * scale.1,
        size.x * scale.0,
        size.y * scale.1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vector2;

    #[test]
    fn test_to_screen_scales_both_axes() {
        let rect = Rectangle::new(Vector2::new(10.0, 5.0), Vector2::new(20.0, 15.0));
        assert_eq!(to_screen(&rect, (5.0, 2.0)), (50.0, 10.0, 50.0, 20.0));
    }
}
