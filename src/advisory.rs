use std::path::Path;

/// Human-readable recipes for turning the rendered frame set into an
/// animation. Purely informational: this program never encodes video itself.
pub fn instructions(frame_dir: &Path, fps: u32) -> String {
    let dir = frame_dir.display();
    format!(
        "Creating an animation from the rendered frames\n\
         Frames in '{dir}' are zero-padded, so lexical order equals time order.\n\
         \n\
         Method 1: FFmpeg (external program)\n\
         Run in a terminal:\n\
         ffmpeg -framerate {fps} -i {dir}/landscape_frame_%05d.png -c:v libx264 -pix_fmt yuv420p landscape_animation.mp4\n\
         ffmpeg -framerate {fps} -i {dir}/landscape_frame_%05d.png landscape_animation.gif\n\
         \n\
         Method 2: the `image` crate (library)\n\
         let mut encoder = image::codecs::gif::GifEncoder::new(std::fs::File::create(\"landscape_animation.gif\")?);\n\
         encoder.set_repeat(image::codecs::gif::Repeat::Infinite)?;\n\
         let mut names: Vec<_> = std::fs::read_dir(\"{dir}\")?.filter_map(|e| e.ok().map(|e| e.path())).collect();\n\
         names.sort();\n\
         for path in names {{\n\
             let frame = image::Frame::from_parts(\n\
                 image::open(&path)?.to_rgba8(),\n\
                 0, 0,\n\
                 image::Delay::from_numer_denom_ms(1000, {fps}),\n\
             );\n\
             encoder.encode_frame(frame)?;\n\
         }}\n\
         \n\
         Note: every snapshot CSV must be present for a gap-free animation;\n\
         missing steps were skipped during rendering.\n"
    )
}

pub fn print_instructions(frame_dir: &Path, fps: u32) {
    println!("{}", instructions(frame_dir, fps));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mentions_both_recipes_and_the_frame_rate() {
        let text = instructions(&PathBuf::from("animation_frames"), 60);

        assert!(text.contains("ffmpeg -framerate 60"));
        assert!(text.contains("GifEncoder"));
        assert!(text.contains("animation_frames/landscape_frame_%05d.png"));
    }

    #[test]
    fn pattern_matches_frame_filenames() {
        let text = instructions(&PathBuf::from("frames"), 30);
        // %05d must agree with the zero padding used by the frame pipeline
        assert!(text.contains("landscape_frame_%05d.png"));
        assert_eq!(
            crate::frames::frame_filename(42),
            "landscape_frame_00042.png"
        );
    }
}
