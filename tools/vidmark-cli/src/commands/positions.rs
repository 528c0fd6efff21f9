//! List overlay positions.

use vidmark_overlay_model::OverlayPosition;

pub fn run() -> anyhow::Result<()> {
    for position in OverlayPosition::ALL {
        let marker = if position == OverlayPosition::default() {
            " (default)"
        } else {
            ""
        };
        println!(
            "{:<14} {}{marker}",
            position.name(),
            position.filter_expression()
        );
    }
    Ok(())
}
