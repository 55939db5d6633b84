use ndarray::Array1;
use ndata_container::*;
use std::error::Error;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

// Stand-in for a real format reader: every session gets two to four units,
// depending on the length of its file name.
struct DemoReader;

impl Reader for DemoReader {
    fn read_spike(&self, source: &SourceRef<'_>) -> Result<SpikeData, NDataError> {
        let num_units = 2 + source.file.as_os_str().len() as UnitId % 3;
        let tags: Array1<UnitId> = (0..100).map(|i| 1 + i % num_units).collect();
        let times = Array1::linspace(0.0, 60.0, tags.len());
        SpikeData::new(times, tags)
    }

    fn read_spatial(&self, _source: &SourceRef<'_>) -> Result<SpatialData, NDataError> {
        let time: Array1<f64> = Array1::linspace(0.0, 60.0, 3000);
        let x = time.mapv(|t| 50.0 + 40.0 * (t / 10.0).sin());
        let y = time.mapv(|t| 50.0 + 40.0 * (t / 10.0).cos());
        SpatialData::new(time, x, y)
    }

    fn read_lfp(&self, _source: &SourceRef<'_>) -> Result<LfpData, NDataError> {
        Ok(LfpData {
            samples: Array1::zeros(15_000),
            sampling_rate: 250.0,
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let reader: Rc<dyn Reader> = Rc::new(DemoReader);
    let mut container = NDataContainer::with_factory(true, move || NData::new(reader.clone()));

    // Three days recorded in the same arena
    container.add_files(
        Modality::Spike,
        Descriptors::new(["day1/rat1.3", "day2/rat1.3", "day03/rat1.3"])
            .with_object_names(["3", "3", "3"])
            .with_systems(["Axona", "Axona", "Axona"]),
    );
    container.add_files(Modality::Position, vec!["arena/rat1.pos"]);
    container.add_files(Modality::Lfp, vec!["day1/rat1.eeg"]);

    container.load_all()?;
    container.set_units(Units::All);

    println!("{}", container);
    println!(
        "Position track: {} samples over {:.1} seconds",
        container.sessions()[0].spatial().num_samples(),
        container.sessions()[0].spatial().duration()
    );
    if let Some(first) = container.session(0) {
        println!("LFP duration on day 1: {:.1} seconds", first.lfp().duration());
    }

    println!("\nUnits:");
    for index in 0..container.len() {
        let location = container.locate(index)?;
        let session = container.get(index)?;
        println!(
            "  {}: session {} unit {} ({} spikes)",
            index,
            location.session,
            location.unit,
            session.unit_stamps().len()
        );
    }

    for problem in container.diagnostics() {
        println!("Warning: {}", problem);
    }

    Ok(())
}
