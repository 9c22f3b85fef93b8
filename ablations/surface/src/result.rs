//! 实验结果.

use std::io::{self, Write};

use prostate_core::AnatomicalRegion;

const S4: &str = "    ";

#[inline]
fn f64_to_display(f: Option<f64>) -> String {
    match f {
        Some(f) => format!("{f:.6}"),
        None => "/".to_string(),
    }
}

/// 相对误差.
#[inline]
fn rel_err(value: f64, ideal: f64) -> Option<f64> {
    (ideal != 0.0).then(|| (value - ideal) / ideal)
}

/// 理想球体上的一行结果.
pub struct SphereRow {
    pub radius: usize,
    pub voxels: usize,
    pub surface_area: f64,
    pub ideal_surface_area: f64,
    pub max_diameter: f64,
    pub ideal_diameter: f64,
    pub sphericity: f64,
    pub elapsed_us: u64,
}

/// 体模上一个区域的结果.
pub struct RegionRow {
    pub region: AnatomicalRegion,
    pub voxels: usize,
    pub volume_ml: f64,
    pub surface_area: f64,
    pub max_diameter: f64,
    pub sphericity: f64,
    pub mean_intensity: f64,
    pub entropy: f64,
    pub confidence: Option<f64>,
    pub requires_review: bool,
}

fn describe_sphere<W: Write>(row: &SphereRow, w: &mut W) -> io::Result<()> {
    writeln!(w, "Sphere r = {}:", row.radius)?;
    writeln!(w, "{S4}Voxels: {}", row.voxels)?;
    writeln!(
        w,
        "{S4}Surface area: {:.3} (ideal {:.3}, rel. error {})",
        row.surface_area,
        row.ideal_surface_area,
        f64_to_display(rel_err(row.surface_area, row.ideal_surface_area))
    )?;
    writeln!(
        w,
        "{S4}Max diameter: {:.3} (ideal {:.3}, rel. error {})",
        row.max_diameter,
        row.ideal_diameter,
        f64_to_display(rel_err(row.max_diameter, row.ideal_diameter))
    )?;
    writeln!(w, "{S4}Sphericity: {:.6}", row.sphericity)?;
    write!(w, "{S4}Metrics time: {} us", row.elapsed_us)?;
    Ok(())
}

fn describe_region<W: Write>(row: &RegionRow, w: &mut W) -> io::Result<()> {
    writeln!(w, "Region `{}`:", row.region)?;
    writeln!(w, "{S4}Voxels: {}", row.voxels)?;
    writeln!(w, "{S4}Volume: {:.3} ml", row.volume_ml)?;
    writeln!(w, "{S4}Surface area: {:.3} mm2", row.surface_area)?;
    writeln!(w, "{S4}Max diameter: {:.3} mm", row.max_diameter)?;
    writeln!(w, "{S4}Sphericity: {:.6}", row.sphericity)?;
    writeln!(w, "{S4}Mean intensity: {:.3}", row.mean_intensity)?;
    writeln!(w, "{S4}Entropy: {:.6}", row.entropy)?;
    writeln!(w, "{S4}Confidence: {}", f64_to_display(row.confidence))?;
    write!(w, "{S4}Requires review: {}", row.requires_review)?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    pub spheres: Vec<SphereRow>,
    pub regions: Vec<RegionRow>,
    /// 外周带与移行带之并占整腺体素的比例.
    pub zone_coverage: f64,
}

impl AblationResult {
    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for row in self.spheres.iter() {
            describe_sphere(row, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();
            utils::sep();
        }
        for row in self.regions.iter() {
            describe_region(row, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();
            utils::sep();
        }
        println!("Zone coverage of whole gland: {:.6}", self.zone_coverage);
        utils::sep();
    }
}
