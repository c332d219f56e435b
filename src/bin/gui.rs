//! GUI application for interactive face swapping.
//!
//! Run with: cargo run --features gui --bin face-graft-gui

use eframe::egui;
use face_graft::{
    BoundingRect, DetectedFace, FaceSwapper, LandmarkDetector, Landmarks, Point, SidecarDetector,
    SourceFace, SwapOutcome, TaskSlot, TaskState,
};
use image::{Rgba, RgbaImage, RgbImage};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let task = match TaskSlot::new("swap-worker") {
        Ok(slot) => slot,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1024.0, 768.0]),
        ..Default::default()
    };

    eframe::run_native(
        "face-graft - Face Swapping",
        options,
        Box::new(|cc| Ok(Box::new(SwapApp::new(cc, task)))),
    )
}

/// Which image the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Source,
    Destination,
    Result,
}

struct SwapApp {
    // Source face, prepared once at load and reused by every swap
    swapper: Option<FaceSwapper>,
    source_face: Option<DetectedFace>,
    source_path: Option<PathBuf>,

    // Destination
    dest_image: Option<RgbImage>,
    dest_path: Option<PathBuf>,
    dest_faces: Vec<DetectedFace>,

    // Swap output
    result: Option<RgbImage>,
    task: TaskSlot<SwapOutcome>,

    // Display state
    display_texture: Option<egui::TextureHandle>,
    view: View,
    show_landmarks: bool,
    status: String,
}

impl SwapApp {
    fn new(_cc: &eframe::CreationContext<'_>, task: TaskSlot<SwapOutcome>) -> Self {
        Self {
            swapper: None,
            source_face: None,
            source_path: None,
            dest_image: None,
            dest_path: None,
            dest_faces: Vec::new(),
            result: None,
            task,
            display_texture: None,
            view: View::Destination,
            show_landmarks: true,
            status: "Load a source face and a destination image to begin".to_string(),
        }
    }

    /// Load a source image and prepare it for swapping. Mesh construction
    /// happens here, once per loaded face, so an unusable source (no face,
    /// several faces, degenerate landmarks) is refused immediately instead
    /// of failing on the first swap.
    fn load_source(&mut self, path: PathBuf) {
        match load_annotated(&path) {
            Ok((image, faces)) => match prepare_source(image, &faces) {
                Ok((swapper, face)) => {
                    self.swapper = Some(swapper);
                    self.source_face = Some(face);
                    self.status = format!("Loaded source face: {}", path.display());
                    self.source_path = Some(path);
                    self.view = View::Source;
                    self.display_texture = None;
                }
                Err(e) => {
                    self.status = e;
                }
            },
            Err(e) => {
                self.status = format!("Failed to load source: {}", e);
            }
        }
    }

    fn load_destination(&mut self, path: PathBuf) {
        match load_annotated(&path) {
            Ok((image, faces)) => {
                self.status = match faces.len() {
                    0 => format!("Destination has no annotated face: {}", path.display()),
                    n => format!("Loaded destination with {} face(s): {}", n, path.display()),
                };
                self.dest_image = Some(image);
                self.dest_faces = faces;
                self.dest_path = Some(path);
                // A new destination invalidates any previous swap.
                self.result = None;
                self.view = View::Destination;
                self.display_texture = None;
            }
            Err(e) => {
                self.status = format!("Failed to load destination: {}", e);
            }
        }
    }

    fn start_swap(&mut self) {
        let Some(ref swapper) = self.swapper else {
            self.status = "No source face loaded".to_string();
            return;
        };
        let Some(ref dest) = self.dest_image else {
            self.status = "No destination image loaded".to_string();
            return;
        };

        let swapper = swapper.clone();
        let dest = dest.clone();
        let faces = self.dest_faces.clone();

        let submitted = self.task.submit(move || swapper.apply(&dest, &faces));
        self.status = match submitted {
            Ok(()) => "Swapping...".to_string(),
            Err(e) => format!("Cannot start swap: {}", e),
        };
    }

    fn save_result(&mut self) {
        let Some(ref result) = self.result else {
            self.status = "No result to save".to_string();
            return;
        };

        if let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("swapped.png")
            .save_file()
        {
            match result.save(&path) {
                Ok(()) => self.status = format!("Saved {}", path.display()),
                Err(e) => self.status = format!("Failed to save: {}", e),
            }
        }
    }

    /// Collect the finished swap, if any.
    fn poll_task(&mut self) {
        match self.task.poll() {
            TaskState::Done(SwapOutcome::Swapped(result)) => {
                self.result = Some(result);
                self.view = View::Result;
                self.display_texture = None;
                self.status = "Swap complete".to_string();
            }
            TaskState::Done(SwapOutcome::NoFaces) => {
                self.status = "No faces found in the destination image".to_string();
            }
            TaskState::Failed(e) => {
                self.status = format!("Swap failed: {}", e);
            }
            TaskState::Running | TaskState::Idle => {}
        }
    }

    fn viewed_image(&self) -> Option<&RgbImage> {
        match self.view {
            View::Source => self.swapper.as_ref().map(|s| s.source().image()),
            View::Destination => self.dest_image.as_ref(),
            View::Result => self.result.as_ref(),
        }
    }

    fn viewed_faces(&self) -> &[DetectedFace] {
        match self.view {
            View::Source => match &self.source_face {
                Some(face) => std::slice::from_ref(face),
                None => &[],
            },
            View::Destination => &self.dest_faces,
            // Landmarks describe pre-swap geometry; leave the result clean.
            View::Result => &[],
        }
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        let Some(image) = self.viewed_image() else {
            return;
        };

        let mut rgba = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let p = image.get_pixel(x, y);
            Rgba([p[0], p[1], p[2], 255])
        });

        if self.show_landmarks {
            for face in self.viewed_faces() {
                draw_rect(&mut rgba, &face.rect, Rgba([0, 255, 0, 255]));
                draw_landmarks(&mut rgba, &face.landmarks);
            }
        }

        let size = [rgba.width() as usize, rgba.height() as usize];
        let pixels: Vec<egui::Color32> = rgba
            .pixels()
            .map(|p| egui::Color32::from_rgba_unmultiplied(p[0], p[1], p[2], p[3]))
            .collect();

        let color_image = egui::ColorImage { size, pixels };
        self.display_texture = Some(ctx.load_texture("view", color_image, Default::default()));
    }
}

impl eframe::App for SwapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_task();

        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Source Face...").clicked() {
                        if let Some(path) = pick_image() {
                            self.load_source(path);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Open Destination...").clicked() {
                        if let Some(path) = pick_image() {
                            self.load_destination(path);
                        }
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Save Result...").clicked() {
                        self.save_result();
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::SidePanel::left("controls").min_width(250.0).show(ctx, |ui| {
            ui.heading("Images");
            ui.separator();

            if ui.button("Load Source Face...").clicked() {
                if let Some(path) = pick_image() {
                    self.load_source(path);
                }
            }
            if let Some(ref path) = self.source_path {
                ui.label(format!("Source: {}", path.display()));
            }
            ui.add_space(8.0);

            if ui.button("Load Destination...").clicked() {
                if let Some(path) = pick_image() {
                    self.load_destination(path);
                }
            }
            if let Some(ref path) = self.dest_path {
                ui.label(format!("Destination: {}", path.display()));
            }
            ui.add_space(16.0);

            ui.heading("Swap");
            ui.separator();

            if ui
                .add_enabled(!self.task.is_running(), egui::Button::new("Swap Faces"))
                .clicked()
            {
                self.start_swap();
            }
            if ui
                .add_enabled(self.result.is_some(), egui::Button::new("Save Result..."))
                .clicked()
            {
                self.save_result();
            }
            ui.add_space(16.0);

            ui.heading("View");
            ui.separator();

            let mut view_changed = false;
            view_changed |= ui.radio_value(&mut self.view, View::Source, "Source").clicked();
            view_changed |= ui
                .radio_value(&mut self.view, View::Destination, "Destination")
                .clicked();
            view_changed |= ui.radio_value(&mut self.view, View::Result, "Result").clicked();
            if ui.checkbox(&mut self.show_landmarks, "Show landmarks").changed() {
                view_changed = true;
            }
            if view_changed {
                self.display_texture = None;
            }
            ui.add_space(16.0);

            ui.heading("Status");
            ui.separator();
            ui.label(&self.status);

            if !self.dest_faces.is_empty() {
                ui.add_space(8.0);
                ui.label(format!("Destination faces: {}", self.dest_faces.len()));
                for (i, face) in self.dest_faces.iter().enumerate() {
                    ui.label(format!(
                        "  Face {}: {}x{} at ({}, {})",
                        i + 1,
                        face.rect.width,
                        face.rect.height,
                        face.rect.x,
                        face.rect.y
                    ));
                }
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.display_texture.is_none() {
                self.refresh_texture(ctx);
            }

            if let Some(ref texture) = self.display_texture {
                let available_size = ui.available_size();
                let texture_size = texture.size_vec2();

                // Scale to fit
                let scale = (available_size.x / texture_size.x)
                    .min(available_size.y / texture_size.y)
                    .min(1.0);
                let display_size = texture_size * scale;

                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), display_size));
                });
            } else {
                ui.centered_and_justified(|ui| {
                    ui.heading("Drag and drop a destination image or use File > Open");
                });
            }
        });

        // Handle drag and drop
        ctx.input(|i| {
            for file in &i.raw.dropped_files {
                if let Some(path) = &file.path {
                    self.load_destination(path.clone());
                }
            }
        });

        // Keep polling while a swap runs in the background.
        if self.task.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "gif"])
        .pick_file()
}

/// Image plus the faces its landmark sidecar annotates.
fn load_annotated(path: &Path) -> face_graft::Result<(RgbImage, Vec<DetectedFace>)> {
    let image = image::open(path)?.to_rgb8();
    let faces = SidecarDetector::new().detect(path)?;
    Ok((image, faces))
}

/// Session swapper for a freshly loaded source image, which must contain
/// exactly one annotated face. Also returns that face for display.
fn prepare_source(
    image: RgbImage,
    faces: &[DetectedFace],
) -> Result<(FaceSwapper, DetectedFace), String> {
    match faces {
        [] => Err("No faces located in the source image".to_string()),
        [face] => {
            let source = SourceFace::new(image, face.landmarks.clone())
                .map_err(|e| format!("Source face is unusable: {}", e))?;
            Ok((FaceSwapper::new(source), face.clone()))
        }
        more => Err(format!(
            "Too many faces located in the source image ({})",
            more.len()
        )),
    }
}

// Drawing helpers

fn draw_rect(img: &mut RgbaImage, rect: &BoundingRect, color: Rgba<u8>) {
    let (img_w, img_h) = img.dimensions();

    for dx in 0..rect.width {
        let px = rect.x + dx;
        if px >= 0 && px < img_w as i32 {
            if rect.y >= 0 && rect.y < img_h as i32 {
                img.put_pixel(px as u32, rect.y as u32, color);
            }
            let by = rect.bottom() - 1;
            if by >= 0 && by < img_h as i32 {
                img.put_pixel(px as u32, by as u32, color);
            }
        }
    }

    for dy in 0..rect.height {
        let py = rect.y + dy;
        if py >= 0 && py < img_h as i32 {
            if rect.x >= 0 && rect.x < img_w as i32 {
                img.put_pixel(rect.x as u32, py as u32, color);
            }
            let rx = rect.right() - 1;
            if rx >= 0 && rx < img_w as i32 {
                img.put_pixel(rx as u32, py as u32, color);
            }
        }
    }
}

fn draw_dot(img: &mut RgbaImage, center: Point, radius: i32, color: Rgba<u8>) {
    let (img_w, img_h) = img.dimensions();
    let cx = center.x as i32;
    let cy = center.y as i32;

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                let px = cx + dx;
                let py = cy + dy;
                if px >= 0 && px < img_w as i32 && py >= 0 && py < img_h as i32 {
                    img.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

fn draw_line(img: &mut RgbaImage, from: Point, to: Point, color: Rgba<u8>) {
    let (img_w, img_h) = img.dimensions();

    let x1 = to.x as i32;
    let y1 = to.y as i32;
    let dx = (x1 - from.x as i32).abs();
    let dy = (y1 - from.y as i32).abs();
    let sx = if (from.x as i32) < x1 { 1 } else { -1 };
    let sy = if (from.y as i32) < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    let mut x = from.x as i32;
    let mut y = from.y as i32;

    loop {
        if x >= 0 && x < img_w as i32 && y >= 0 && y < img_h as i32 {
            img.put_pixel(x as u32, y as u32, color);
        }

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_polyline(img: &mut RgbaImage, points: &[Point], close: bool, color: Rgba<u8>) {
    for pair in points.windows(2) {
        draw_line(img, pair[0], pair[1], color);
    }
    if close && points.len() > 2 {
        draw_line(img, points[points.len() - 1], points[0], color);
    }
}

fn draw_landmarks(img: &mut RgbaImage, landmarks: &Landmarks) {
    let red = Rgba([255, 0, 0, 255]);
    let cyan = Rgba([0, 255, 255, 255]);

    // Open curves: jaw, brows, nose bridge, nostril line.
    let nose = landmarks.nose();
    draw_polyline(img, landmarks.jaw(), false, cyan);
    draw_polyline(img, landmarks.right_brow(), false, cyan);
    draw_polyline(img, landmarks.left_brow(), false, cyan);
    draw_polyline(img, &nose[..4], false, cyan);
    draw_polyline(img, &nose[4..], false, cyan);

    // Closed loops: eyes, outer and inner lips.
    let mouth = landmarks.mouth();
    draw_polyline(img, landmarks.right_eye(), true, cyan);
    draw_polyline(img, landmarks.left_eye(), true, cyan);
    draw_polyline(img, &mouth[..12], true, cyan);
    draw_polyline(img, &mouth[12..], true, cyan);

    for point in landmarks.iter() {
        draw_dot(img, *point, 2, red);
    }
}
