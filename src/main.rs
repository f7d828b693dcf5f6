use sverdrup::basin::{BasinSelector, BoxBasinSelector, ExtremaRule};
use sverdrup::config::Config;
use sverdrup::field::FieldMeta;
use sverdrup::moc::{MocOptions, calc_zmoc};
use sverdrup::readers;
use sverdrup::tseries::{CellKind, CellSeries, LatSelector, ReferenceSeries, extract_annual, figure_path};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "./config/moc.json".to_string());
    let config = Config::from_file(&config_path)?;

    let mesh = readers::load_mesh(config.mesh_path())?;
    println!(
        "Mesh {}: {} nodes, {} elements, {} levels",
        config.mesh_path().display(),
        mesh.n_nodes(),
        mesh.n_elems(),
        mesh.n_levels()
    );

    let basin = config.which_moc();
    let mask = BoxBasinSelector.select(&mesh, basin, config.on_elements());
    println!("{}: {} locations in basin", basin.label(), mask.len());

    let cells: &[CellKind] = match basin.extrema_rule() {
        ExtremaRule::AtlanticLike => &[CellKind::UpperCell, CellKind::LowerCell],
        ExtremaRule::PacificLike => &[CellKind::LowerCell],
        ExtremaRule::None => &[CellKind::LowerCell],
    };
    let selector = LatSelector::MaxEnvelope;

    let opts = MocOptions {
        basin,
        dlat: config.dlat(),
        on_elements: config.on_elements(),
        do_info: config.do_info(),
    };

    let mut all_series: Vec<(String, CellKind, CellSeries)> = Vec::new();

    for run in config.runs() {
        let diag_file = readers::find_diag_file(&run.runid, &run.datapath, config.mesh_path())?;
        println!(" --> found diag file: {}", diag_file.display());

        let w_files = readers::find_w_files(&run.datapath, &run.runid);
        if w_files.is_empty() {
            println!(
                "WARNING: no vertical velocity files for run {:?} under {}",
                run.runid,
                run.datapath.display()
            );
            continue;
        }

        let meta = FieldMeta {
            runid: run.runid.clone(),
            datapath: run.datapath.display().to_string(),
            descript: run.name.clone(),
            long_name: "vertical velocity".to_string(),
            units: "m/s".to_string(),
        };
        let field = readers::load_w(&w_files, meta)?;

        let want_nloc = if config.on_elements() { mesh.n_elems() } else { mesh.n_nodes() };
        let weight = readers::load_area_weight(
            &diag_file,
            config.on_elements(),
            field.nz(),
            want_nloc,
        )?;

        let sf = calc_zmoc(&mesh, &field, &weight, &mask, &opts)?;

        for &cell in cells {
            let series = extract_annual(&sf, cell, selector)?;
            all_series.push((run.name.clone(), cell, series));
        }
    }

    let cycles = match (config.do_concat(), config.cycles()) {
        (true, Some(c)) if c > 0 => c,
        _ => 1,
    };

    for (i, (run_name, cell, series)) in all_series.iter().enumerate() {
        let cycle_index = if cycles > 1 {
            (i / cells.len()) as u32 % cycles + 1
        } else {
            1
        };
        let years = series.display_years(cycle_index);

        println!("{} ({}), {} @ {}:", run_name, basin, cell.title(), selector.label());
        for (year, value) in years.iter().zip(&series.values) {
            println!("  {}  {:8.3} Sv", year, value);
        }
        if let Some(summary) = series.summary() {
            println!("  mean {:.2} Sv, std {:.2} Sv", summary.mean, summary.std);
        }
    }

    if let Some(reference_path) = config.reference_series() {
        let reference = ReferenceSeries::from_csv(reference_path, "reference")?;
        let annual = reference.annual();
        if let Some(summary) = annual.summary() {
            println!(
                "reference {} ({} years): mean {:.2} Sv, std {:.2} Sv",
                reference_path.display(),
                annual.years.len(),
                summary.mean,
                summary.std
            );
        }
    }

    if let Some(save_path) = config.save_path() {
        for &cell in cells {
            let target = figure_path(save_path, cell, &selector);
            println!(
                "figure target: {} (dpi {})",
                target.display(),
                config.save_dpi()
            );
        }
    }

    Ok(())
}
