use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, pos2, vec2};

pub(super) fn to_pos2(point: glam::Vec2) -> Pos2 {
    pos2(point.x, point.y)
}

pub(super) fn to_glam(point: Pos2) -> glam::Vec2 {
    glam::Vec2::new(point.x, point.y)
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

/// Darkens and fades `color`; `factor` 1.0 leaves it unchanged.
pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor.max(0.45)) as u8,
        (color.g() as f32 * factor.max(0.45)) as u8,
        (color.b() as f32 * factor.max(0.45)) as u8,
        (color.a() as f32 * factor) as u8,
    )
}

pub(super) fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r(),
        color.g(),
        color.b(),
        (color.a() as f32 * alpha.clamp(0.0, 1.0)) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, offset: Vec2, spacing: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(17, 21, 28));

    let step = spacing.max(20.0);
    let origin = rect.center() + offset;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 60));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

/// Fill colour per node kind. Unknown kinds get a stable colour from the name.
pub(super) fn kind_color(kind: &str) -> Color32 {
    match kind {
        "program" => Color32::from_rgb(246, 206, 104),
        "assembly" => Color32::from_rgb(120, 170, 255),
        "component" => Color32::from_rgb(92, 200, 170),
        "supplier" => Color32::from_rgb(190, 140, 250),
        "alternate" => Color32::from_rgb(140, 214, 96),
        "notice" => Color32::from_rgb(241, 110, 94),
        other => {
            let (x, y) = dmsms_graph::util::stable_pair(other);
            Color32::from_rgb(
                (150.0 + x * 70.0) as u8,
                (150.0 + y * 70.0) as u8,
                (170.0 - x * 40.0) as u8,
            )
        }
    }
}

/// Point `t` of the way along `start → end`.
pub(super) fn lerp_pos(start: Pos2, end: Pos2, t: f32) -> Pos2 {
    start + (end - start) * t
}

pub(super) fn tooltip_anchor(rect: Rect, center: Pos2, radius: f32, size: Vec2) -> Pos2 {
    let mut anchor = center + vec2(radius + 10.0, -size.y * 0.5);
    if anchor.x + size.x > rect.right() - 4.0 {
        anchor.x = center.x - radius - 10.0 - size.x;
    }
    anchor.y = anchor.y.clamp(rect.top() + 4.0, (rect.bottom() - size.y - 4.0).max(rect.top() + 4.0));
    anchor.x = anchor.x.max(rect.left() + 4.0);
    anchor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_checks_respect_padding() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0));
        assert!(circle_visible(rect, pos2(-5.0, 50.0), 6.0));
        assert!(!circle_visible(rect, pos2(-10.0, 50.0), 6.0));
        assert!(edge_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0), 0.0));
        assert!(!edge_visible(rect, pos2(-50.0, -50.0), pos2(-10.0, -5.0), 2.0));
    }

    #[test]
    fn tooltip_stays_inside_the_viewport() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(300.0, 200.0));
        let size = vec2(120.0, 60.0);
        let anchor = tooltip_anchor(rect, pos2(290.0, 195.0), 10.0, size);
        assert!(anchor.x + size.x <= rect.right());
        assert!(anchor.y + size.y <= rect.bottom());
    }

    #[test]
    fn known_kinds_have_distinct_colours() {
        assert_ne!(kind_color("component"), kind_color("supplier"));
        assert_eq!(kind_color("mystery"), kind_color("mystery"));
    }
}
