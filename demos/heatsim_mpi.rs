//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
use approx::assert_relative_eq;
#[cfg(feature = "mpi")]
use heatsim::{
    comm::{LocalUniverse, MpiGroup},
    grid::Grid,
    stencil::HeatDiffusion,
    traits::ProcessGroup,
    run, SimulationOptions,
};
#[cfg(feature = "mpi")]
use mpi::{environment::Universe, traits::Communicator};

/// A process grid as close to square as `size` allows
#[cfg(feature = "mpi")]
fn process_grid(size: usize) -> [usize; 2] {
    let dx = (1..=size)
        .take_while(|d| d * d <= size)
        .filter(|d| size % d == 0)
        .last()
        .unwrap_or(1);
    [size / dx, dx]
}

/// A cold plate with a hot square off centre
#[cfg(feature = "mpi")]
fn initial_field(width: usize, height: usize) -> Grid {
    let mut field = Grid::new(width, height, 0);
    for y in height / 4..height / 2 {
        for x in width / 3..width / 2 {
            *field.get_cell_mut(x as isize, y as isize).unwrap() = 100.0;
        }
    }
    field
}

#[cfg(feature = "mpi")]
fn main() {
    env_logger::init();
    let universe: Universe = mpi::initialize().unwrap();
    let world = universe.world();
    let rank = world.rank();
    let size = world.size() as usize;

    let field = initial_field(67, 41);
    let stencil = HeatDiffusion::new(0.2).unwrap();
    let mut options = SimulationOptions::default();
    options.set_dims(process_grid(size)).set_steps(250);

    let group = MpiGroup::new(world);
    let result = match run(&group, &options, (rank == 0).then_some(&field), &stencil) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("[{rank}] {e}");
            std::process::exit(1);
        }
    };

    if let Some(result) = result {
        let dims = options.dims();
        println!(
            "Ran {} steps on a {}x{} process grid; total heat {:.6}",
            options.steps(),
            dims[0],
            dims[1],
            result.data().iter().sum::<f64>()
        );

        // Repeat on a single in-process rank and compare
        let mut serial = options.clone();
        serial.set_dims([1, 1]);
        let reference = LocalUniverse::new(1).run(|local| {
            assert_eq!(local.size(), 1);
            run(&local, &serial, Some(&field), &stencil).unwrap()
        });
        let reference = reference[0].as_ref().unwrap();
        for (a, b) in result.data().iter().zip(reference.data()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
        println!("Matches the single rank run.");
    }
}

#[cfg(not(feature = "mpi"))]
fn main() {}
