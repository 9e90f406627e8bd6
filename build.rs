//! Build script to embed Windows resource metadata into the executable
//! This sets the application name shown in Task Manager

fn main() {
    #[cfg(windows)]
    {
        let mut res = winresource::WindowsResource::new();

        res.set("ProductName", "Resolution Changer");
        res.set("FileDescription", "Resolution Changer");
        res.set("InternalName", "ResolutionChanger");
        res.set("OriginalFilename", "resolution_changer.exe");
        res.set("ProductVersion", env!("CARGO_PKG_VERSION"));
        res.set("FileVersion", env!("CARGO_PKG_VERSION"));

        // Embed the tray icon as the executable icon when it is present
        if std::path::Path::new("assets/icon.ico").exists() {
            res.set_icon("assets/icon.ico");
        }

        if let Err(e) = res.compile() {
            eprintln!("Warning: Failed to compile Windows resources: {}", e);
        }
    }
}
