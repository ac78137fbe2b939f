//! Binary that emits command-line options markdown to stdout.

fn main() {
    print!("{}", tfsview_cli::render_options_markdown());
}
