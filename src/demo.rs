// Demo frame renderer: a widget window plus optional bar and line plots.

use crate::config::DemoConfig;
use crate::driver::FrameRenderer;
use crate::plot;

const PLOT_SIZE: [f32; 2] = [0.0, 160.0];
const LINE_RANGE: (f32, f32) = (0.0, std::f32::consts::TAU);

pub struct DemoApp {
    config: DemoConfig,
    value: f32,
    counter: u32,
    bars: Vec<f32>,
    bar_max: f32,
    line: Vec<f32>,
}

impl DemoApp {
    pub fn new(config: DemoConfig) -> Self {
        let bars = plot::bar_values(config.bars);
        let bar_max = bars.last().copied().unwrap_or(0.0);
        let (_, line) = plot::sine_samples(config.samples, LINE_RANGE.0, LINE_RANGE.1, config.amplitude);

        Self {
            config,
            value: 0.0,
            counter: 0,
            bars,
            bar_max,
            line,
        }
    }

    fn widgets(&mut self, ui: &imgui::Ui) {
        ui.window("Hello, world!").build(|| {
            ui.slider("float", 0.0, 1.0, &mut self.value);
            if ui.button("Button") {
                self.counter += 1;
            }
            ui.same_line();
            ui.text(format!("counter = {}", self.counter));

            let framerate = ui.io().framerate;
            ui.text(format!(
                "Application average {:.3} ms/frame ({:.1} FPS)",
                1000.0 / framerate,
                framerate
            ));
        });
    }

    fn plots(&self, ui: &imgui::Ui) {
        ui.window("Plots").build(|| {
            if self.config.bar_plot {
                ui.plot_histogram("Bars", &self.bars)
                    .scale_min(0.0)
                    .scale_max(self.bar_max)
                    .graph_size(PLOT_SIZE)
                    .build();
            }
            if self.config.line_plot {
                let amplitude = self.config.amplitude.abs();
                ui.plot_lines("sin(x)", &self.line)
                    .scale_min(-amplitude)
                    .scale_max(amplitude)
                    .graph_size(PLOT_SIZE)
                    .build();
            }
        });
    }
}

impl FrameRenderer for DemoApp {
    fn render_frame(&mut self, ui: &imgui::Ui) {
        if self.config.widgets {
            self.widgets(ui);
        }
        if self.config.bar_plot || self.config.line_plot {
            self.plots(ui);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_data_follows_config() {
        let demo = DemoApp::new(DemoConfig {
            bars: 10,
            samples: 50,
            amplitude: 2.0,
            ..DemoConfig::default()
        });
        assert_eq!(demo.bars.len(), 10);
        assert_eq!(demo.bar_max, 90.0);
        assert_eq!(demo.line.len(), 50);
        assert!(demo.line.iter().all(|y| y.abs() <= 2.0));
    }

    #[test]
    fn test_demo_without_samples() {
        let demo = DemoApp::new(DemoConfig {
            bars: 0,
            samples: 0,
            ..DemoConfig::default()
        });
        assert!(demo.bars.is_empty());
        assert_eq!(demo.bar_max, 0.0);
        assert!(demo.line.is_empty());
    }

    #[test]
    fn test_bar_count_is_independent_of_line_samples() {
        let demo = DemoApp::new(DemoConfig {
            bars: 25,
            samples: 3,
            ..DemoConfig::default()
        });
        assert_eq!(demo.bars.len(), 25);
        assert_eq!(demo.bar_max, 240.0);
        assert_eq!(demo.line.len(), 3);
    }
}
